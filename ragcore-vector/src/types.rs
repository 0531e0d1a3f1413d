//! Request/response types for vector storage, trimmed of the multi-tenant
//! scope fields the system this is grounded on carries — this workspace is
//! single-node and uses metadata filters instead of tenant scoping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A vector plus the metadata payload carried alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl VectorEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Query parameters for a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub filter: Option<HashMap<String, Value>>,
    pub threshold: Option<f32>,
    pub include_metadata: bool,
}

impl VectorQuery {
    #[must_use]
    pub const fn new(vector: Vec<f32>, k: usize) -> Self {
        Self {
            vector,
            k,
            filter: None,
            threshold: None,
            include_metadata: true,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: HashMap<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// One hit from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorResult {
    pub id: String,
    pub score: f32,
    pub metadata: Option<HashMap<String, Value>>,
}

/// Point-in-time statistics about the index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageStats {
    pub total_vectors: usize,
    pub deleted_vectors: usize,
    pub dimensions: usize,
    pub backend: String,
    pub index_build_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_query_builder() {
        let query = VectorQuery::new(vec![1.0, 2.0], 5).with_threshold(0.5);
        assert_eq!(query.k, 5);
        assert_eq!(query.threshold, Some(0.5));
    }
}
