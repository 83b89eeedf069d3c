//! Reflex - Self-Correcting Rule-Based Assistant Library
//!
//! Answers queries from a small set of symbolic, human-auditable rules and
//! falls back to a generative model only when no rule applies. Feedback on
//! a bad answer, together with a correction, synthesizes a new rule, so the
//! system leans on the model less the more it is corrected.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reflex::config::Config;
//! use reflex::engine::{Agent, RuleRepository, Sentiment};
//! use reflex::llm::{OpenRouterClient, ProviderConfig};
//! use reflex::store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = JsonFileStore::new(config.store.rules_path()?)?;
//!     let repository = RuleRepository::new(Box::new(store), config.engine.score.clone());
//!     let provider = ProviderConfig::openrouter("sk-...".into(), config.openrouter.default_model.clone());
//!     let model = Arc::new(OpenRouterClient::new(provider)?);
//!
//!     let mut agent = Agent::new(repository, model, &config.engine);
//!     agent.load_rules();
//!
//!     let turn = agent.answer("what is the refund policy").await?;
//!     println!("{}", turn.response);
//!     agent.feedback(&turn, Sentiment::Negative, Some("5 business days")).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod security;
pub mod store;

// Re-export commonly used types for convenience
pub use engine::{
    Agent, AgentStats, FeedbackOutcome, Pattern, Rule, RuleRepository, ScorePolicy, Sentiment,
    Turn, TurnStatus,
};

pub use error::{AgentError, ModelError, StoreError};

pub use llm::{LanguageModel, OpenRouterClient};

pub use store::{JsonFileStore, RuleStore};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Self-Correcting Rule-Based Assistant", NAME, VERSION)
}
