//! `VectorStorage`: the async-facing trait other crates depend on instead
//! of the concrete [`crate::index::VectorIndex`], so ingestion and
//! conversation code can be tested against an in-memory fake.

use crate::types::{StorageStats, VectorQuery, VectorResult};
use async_trait::async_trait;
use ragcore_core::error::CoreError;
use ragcore_metadata::MetadataRecord;

#[async_trait]
pub trait VectorStorage: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] or [`CoreError::InvalidParameter`]
    /// on a dimension mismatch.
    async fn insert(&self, items: Vec<(Vec<f32>, MetadataRecord)>) -> Result<Vec<String>, CoreError>;

    /// # Errors
    ///
    /// See [`Self::insert`].
    async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorResult>, CoreError>;

    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] on a storage-layer failure.
    async fn delete(&self, ids: &[String]) -> Result<(), CoreError>;

    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] on a storage-layer failure.
    async fn stats(&self) -> Result<StorageStats, CoreError>;

    /// Look up a single live record's metadata by vector id.
    async fn get_metadata(&self, id: &str) -> Result<Option<MetadataRecord>, CoreError>;

    /// Merge `updates` into a live record's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `id` doesn't name a live record.
    async fn update_metadata(&self, id: &str, updates: serde_json::Map<String, serde_json::Value>) -> Result<(), CoreError>;

    /// All live vector ids whose metadata `doc_path` equals `doc_path`.
    async fn find_by_doc_path(&self, doc_path: &str) -> Result<Vec<String>, CoreError>;

    /// Delete every live vector whose metadata `doc_path` equals `doc_path`,
    /// returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] on a storage-layer failure.
    async fn delete_by_doc_path(&self, doc_path: &str) -> Result<usize, CoreError>;

    /// Resolve the vector ids belonging to the same document as
    /// `doc_path`/`filename`/`file_path`, trying each in turn and stopping
    /// at the first that yields a match.
    async fn find_by_path_identity(
        &self,
        doc_path: Option<&str>,
        filename: Option<&str>,
        file_path: Option<&str>,
    ) -> Result<Vec<String>, CoreError>;

    /// Wipe every vector and all metadata, resetting to an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] on a storage-layer failure.
    async fn clear(&self) -> Result<(), CoreError>;
}

#[async_trait]
impl VectorStorage for crate::index::VectorIndex {
    async fn insert(&self, items: Vec<(Vec<f32>, MetadataRecord)>) -> Result<Vec<String>, CoreError> {
        self.add_vectors(items)
    }

    async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorResult>, CoreError> {
        let mut results = crate::index::VectorIndex::search(self, &query.vector, query.k)?;
        if let Some(threshold) = query.threshold {
            results.retain(|r| r.score >= threshold);
        }
        if let Some(filter) = &query.filter {
            results.retain(|r| crate::filterable::matches_filter(r.metadata.as_ref(), filter));
        }
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), CoreError> {
        crate::index::VectorIndex::delete(self, ids)
    }

    async fn stats(&self) -> Result<StorageStats, CoreError> {
        Ok(crate::index::VectorIndex::stats(self))
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<MetadataRecord>, CoreError> {
        Ok(crate::index::VectorIndex::get_metadata(self, id))
    }

    async fn update_metadata(&self, id: &str, updates: serde_json::Map<String, serde_json::Value>) -> Result<(), CoreError> {
        crate::index::VectorIndex::update_metadata(self, id, updates)
    }

    async fn find_by_doc_path(&self, doc_path: &str) -> Result<Vec<String>, CoreError> {
        Ok(crate::index::VectorIndex::find_vectors_by_doc_path(self, doc_path))
    }

    async fn delete_by_doc_path(&self, doc_path: &str) -> Result<usize, CoreError> {
        crate::index::VectorIndex::delete_vectors_by_doc_path(self, doc_path)
    }

    async fn find_by_path_identity(
        &self,
        doc_path: Option<&str>,
        filename: Option<&str>,
        file_path: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        Ok(crate::index::VectorIndex::find_by_path_identity(self, doc_path, filename, file_path))
    }

    async fn clear(&self) -> Result<(), CoreError> {
        crate::index::VectorIndex::clear(self)
    }
}
