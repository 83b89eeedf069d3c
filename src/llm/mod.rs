//! Language model capability.
//!
//! The core only sees `generate(prompt) -> text`. The OpenRouter client is
//! one implementation; tests substitute mocks or scripted models.

pub mod openrouter;

pub use openrouter::{OpenRouterClient, ProviderConfig};

use async_trait::async_trait;

use crate::error::ModelError;

/// Narrow interface to a generative model, used for fallback answers and
/// rule synthesis.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
