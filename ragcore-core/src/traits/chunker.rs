//! Splits extracted text into chunks for embedding.

use crate::error::CoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// One chunk produced by a [`Chunker`], prior to embedding.
#[derive(Debug, Clone)]
pub struct ChunkedText {
    pub text: String,
    pub chunk_index: usize,
    pub metadata: HashMap<String, Value>,
}

/// Splits a document's text into chunks.
///
/// Implementations may lazily load a semantic segmentation model on first
/// use; `Chunker` itself stays synchronous-construction / async-use.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Chunking`] if segmentation fails (e.g. a
    /// semantic model fails to load).
    async fn chunk_text(
        &self,
        text: &str,
        metadata: Option<&HashMap<String, Value>>,
    ) -> Result<Vec<ChunkedText>, CoreError>;
}
