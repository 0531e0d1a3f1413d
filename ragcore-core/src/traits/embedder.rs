//! Embedding generation, extracted as a standalone trait so that neither
//! the ingestion pipeline nor the conversational query engine needs to
//! depend on a concrete embedding provider.

use crate::error::CoreError;
use async_trait::async_trait;

/// Produces fixed-dimension embeddings for text.
///
/// # Example
///
/// ```rust,ignore
/// use ragcore_core::traits::Embedder;
/// use async_trait::async_trait;
///
/// struct MyEmbedder;
///
/// #[async_trait]
/// impl Embedder for MyEmbedder {
///     fn model_name(&self) -> &str { "my-model" }
///     fn dimension(&self) -> usize { 384 }
///     async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ragcore_core::error::CoreError> {
///         Ok(vec![0.0; 384])
///     }
///     async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ragcore_core::error::CoreError> {
///         let mut out = Vec::with_capacity(texts.len());
///         for t in texts {
///             out.push(self.embed_text(t).await?);
///         }
///         Ok(out)
///     }
/// }
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying embedding model.
    fn model_name(&self) -> &str;

    /// Dimensionality of vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Embedding`] or [`CoreError::Dependency`] if the
    /// provider is unavailable or the text cannot be embedded. Callers
    /// should treat errors as retryable with bounded exponential backoff.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CoreError>;

    /// Embed a batch of strings in one call.
    ///
    /// Default implementation falls back to sequential [`Self::embed_text`]
    /// calls; providers with native batch support should override this.
    ///
    /// # Errors
    ///
    /// See [`Self::embed_text`].
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_text(text).await?);
        }
        Ok(out)
    }
}
