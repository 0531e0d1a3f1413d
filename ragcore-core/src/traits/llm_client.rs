//! Text-generation collaborator used by the conversational query engine.
//!
//! Absence of an `LLMClient` is permitted: the engine degrades to
//! extractive responses assembled directly from retrieved context.

use crate::error::CoreError;
use async_trait::async_trait;

/// Options accepted by [`LLMClient::generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// A text-generation provider (an LLM chat/completion endpoint).
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Dependency`] if the provider is unreachable, or
    /// [`CoreError::Timeout`] if the call exceeds its budget.
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<String, CoreError>;
}
