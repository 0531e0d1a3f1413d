//! The flat `MetadataRecord` schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Flat metadata attached to one vector / chunk.
///
/// Named fields cover the semantic keys the rest of the core reasons
/// about directly; anything else submitted by a caller survives in
/// `extras` rather than being dropped, so round-tripping through
/// [`Self::to_flat_map`]/[`Self::from_flat_map`] is lossless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub vector_id: String,
    pub doc_id: String,
    pub chunk_index: u32,
    pub text: String,

    #[serde(default)]
    pub doc_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,

    #[serde(default)]
    pub chunk_size: u32,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default = "default_source_type")]
    pub source_type: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ingested_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub processor: Option<String>,
    #[serde(default)]
    pub chunking_method: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,

    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "_schema_version", default = "default_version")]
    pub schema_version: u32,

    /// Any key not covered above, preserved verbatim.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

fn default_source_type() -> String {
    "unknown".to_string()
}

fn default_version() -> u32 {
    1
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            vector_id: "unknown".to_string(),
            doc_id: "unknown".to_string(),
            chunk_index: 0,
            text: String::new(),
            doc_path: None,
            filename: None,
            file_path: None,
            chunk_size: 0,
            total_chunks: 0,
            source_type: "unknown".to_string(),
            created_at: Utc::now(),
            ingested_at: None,
            processor: None,
            chunking_method: None,
            embedding_model: None,
            title: None,
            author: None,
            description: None,
            tags: HashSet::new(),
            deleted: false,
            version: 1,
            schema_version: 1,
            extras: Map::new(),
        }
    }
}

impl MetadataRecord {
    /// Per-field validation beyond what [`crate::validator::MetadataValidator`]
    /// checks at the raw-map stage.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.doc_id.is_empty() || self.doc_id == "unknown" {
            errors.push("doc_id is required and cannot be 'unknown'".to_string());
        }
        if self.text.is_empty() {
            errors.push("text content is required".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_fails_validation() {
        let record = MetadataRecord::default();
        let errors = record.validate();
        assert_eq!(errors.len(), 2);
    }
}
