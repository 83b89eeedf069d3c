//! Error taxonomy for the rule engine and its capabilities.
//!
//! Persistence and model failures are expected external errors and are
//! surfaced to the caller as a failed turn. `DuplicateId` and `NotFound`
//! indicate repository integrity violations and get loud logging at the
//! point of detection.

use thiserror::Error;

/// Failures of the persistence capability.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored snapshot is not a well-formed collection of valid rules.
    #[error("rule store is corrupt: {0}")]
    Corrupt(String),

    /// The snapshot could not be written durably.
    #[error("failed to write rule store: {0}")]
    Write(String),
}

/// Failures of the language model capability.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model endpoint could not be reached or rejected the request.
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    /// The model did not answer within the configured deadline.
    #[error("language model timed out after {0}s")]
    Timeout(u64),
}

/// Turn-level errors surfaced by the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// A rule with this id already exists in the repository.
    #[error("duplicate rule id: {0}")]
    DuplicateId(String),

    /// No rule with this id exists in the repository.
    #[error("no rule with id: {0}")]
    NotFound(String),

    /// The synthesized candidate was malformed or duplicated an existing rule.
    #[error("synthesized rule failed validation: {0}")]
    SynthesisValidation(String),
}

impl AgentError {
    /// Stable kind token for the presentation shell's `error: <kind>` status.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Store(StoreError::Corrupt(_)) => "store-corrupt",
            AgentError::Store(StoreError::Write(_)) => "store-write",
            AgentError::Model(ModelError::Unavailable(_)) => "model-unavailable",
            AgentError::Model(ModelError::Timeout(_)) => "model-timeout",
            AgentError::DuplicateId(_) => "duplicate-id",
            AgentError::NotFound(_) => "not-found",
            AgentError::SynthesisValidation(_) => "synthesis-validation",
        }
    }
}
