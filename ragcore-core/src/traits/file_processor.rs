//! File-type-specific extraction, dispatched by a registry keyed on
//! extension or content sniff.

use crate::error::CoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of a [`FileProcessor::process`] call.
///
/// When `chunks` is populated the caller uses them directly (the processor
/// understood document structure well enough to chunk itself, e.g. a
/// slide-per-chunk PDF processor); otherwise `text` is handed to a generic
/// [`super::chunker::Chunker`].
#[derive(Debug, Clone, Default)]
pub struct ProcessedFile {
    pub text: Option<String>,
    pub chunks: Option<Vec<(String, HashMap<String, Value>)>>,
    pub metadata: HashMap<String, Value>,
}

/// Extracts text (or pre-chunked text) from one file.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    /// File extensions this processor claims, lowercase, without the dot.
    fn extensions(&self) -> &[&str];

    /// Process the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Ingestion`] if the file cannot be read or
    /// parsed. Per-file failures never abort a batch; the caller marks the
    /// file failed and continues.
    async fn process(
        &self,
        path: &std::path::Path,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<ProcessedFile, CoreError>;
}

/// Dispatches a path to the registered [`FileProcessor`] for its extension,
/// falling back to a generic extractor when none matches.
pub struct FileProcessorRegistry {
    processors: HashMap<String, std::sync::Arc<dyn FileProcessor>>,
    fallback: std::sync::Arc<dyn FileProcessor>,
}

impl FileProcessorRegistry {
    #[must_use]
    pub fn new(fallback: std::sync::Arc<dyn FileProcessor>) -> Self {
        Self {
            processors: HashMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with_processor(mut self, processor: std::sync::Arc<dyn FileProcessor>) -> Self {
        for ext in processor.extensions() {
            self.processors.insert((*ext).to_string(), processor.clone());
        }
        self
    }

    /// Resolve the processor registered for `path`'s extension, or the
    /// fallback extractor if none matches.
    #[must_use]
    pub fn resolve(&self, path: &std::path::Path) -> std::sync::Arc<dyn FileProcessor> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        ext.and_then(|e| self.processors.get(&e).cloned())
            .unwrap_or_else(|| self.fallback.clone())
    }
}
