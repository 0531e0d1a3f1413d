//! Consistent, deduplicated metadata handling.
//!
//! Unlike the module this is ported from, `MetadataManager` is an
//! explicit, constructor-injected collaborator rather than a process-wide
//! singleton: callers hold an `Arc<MetadataManager>` and share it, instead
//! of reaching for a module-level global.

use crate::record::MetadataRecord;
use crate::validator::MetadataValidator;
use chrono::Utc;
use ragcore_config::MetadataConfig;
use ragcore_core::error::CoreError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Merges and normalizes metadata contributed by a document, its chunk and
/// any caller-supplied overrides into one [`MetadataRecord`].
pub struct MetadataManager {
    config: MetadataConfig,
    doc_id_cache: parking_lot::Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for MetadataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetadataManager {
    #[must_use]
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config,
            doc_id_cache: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// `{doc_id}_chunk_{chunk_index}` — the one-to-one key tying a vector
    /// back to its chunk.
    #[must_use]
    pub fn generate_vector_id(doc_id: &str, chunk_index: u32) -> String {
        format!("{doc_id}_chunk_{chunk_index}")
    }

    /// Derive a stable `doc_id` from whichever identifying field is
    /// present, in priority order: existing `doc_id`, `doc_path`,
    /// `file_path`, `filename`, a hash of `text`, `title`, or finally a
    /// timestamp.
    pub fn generate_doc_id(&self, metadata: &Map<String, Value>) -> String {
        if let Some(Value::String(doc_id)) = metadata.get("doc_id") {
            if !doc_id.is_empty() && doc_id != "unknown" {
                return doc_id.clone();
            }
        }

        if let Some(Value::String(doc_path)) = metadata.get("doc_path") {
            return self.cached_path_id(&format!("path:{doc_path}"), || {
                let cleaned = doc_path
                    .trim_matches('/')
                    .replace('/', "_")
                    .replace(' ', "_")
                    .replace('\\', "_");
                let stem = cleaned.rsplit_once('.').map_or(cleaned.as_str(), |(s, _)| s);
                format!("doc_{stem}")
            });
        }

        if let Some(Value::String(file_path)) = metadata.get("file_path") {
            return self.cached_path_id(&format!("filepath:{file_path}"), || {
                let stem = std::path::Path::new(file_path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(file_path);
                format!("doc_{}", stem.replace(' ', "_").replace('-', "_"))
            });
        }

        if let Some(Value::String(filename)) = metadata.get("filename") {
            return self.cached_path_id(&format!("file:{filename}"), || {
                let base = filename.rsplit_once('.').map_or(filename.as_str(), |(s, _)| s);
                format!("doc_{}", base.replace(' ', "_").replace('-', "_"))
            });
        }

        if let Some(Value::String(text)) = metadata.get("text") {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            return format!("doc_hash_{}", &digest[..8]);
        }

        if let Some(Value::String(title)) = metadata.get("title") {
            let cleaned = title.replace(' ', "_").replace('-', "_");
            let truncated: String = cleaned.chars().take(50).collect();
            return format!("doc_{truncated}");
        }

        format!("doc_{}", Utc::now().format("%Y%m%d_%H%M%S_%6f"))
    }

    fn cached_path_id(&self, cache_key: &str, compute: impl FnOnce() -> String) -> String {
        let mut cache = self.doc_id_cache.lock();
        if let Some(existing) = cache.get(cache_key) {
            return existing.clone();
        }
        let id = compute();
        cache.insert(cache_key.to_string(), id.clone());
        id
    }

    /// Merge one or more metadata maps (later maps override earlier ones),
    /// normalize them, fill in `doc_id`/`vector_id` if missing, and produce
    /// a [`MetadataRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Metadata`] if, after merging, required fields
    /// (`text`) are still missing — the only hard failure this step can
    /// produce; conflicts and deprecated keys are logged as warnings, not
    /// errors.
    pub fn merge_metadata(
        &self,
        sources: &[Map<String, Value>],
        validate: bool,
    ) -> Result<MetadataRecord, CoreError> {
        let mut merged = Map::new();
        for source in sources {
            if source.is_empty() {
                continue;
            }
            let normalized = MetadataValidator::normalize(source);
            for (key, value) in normalized {
                merged.insert(key, value);
            }
        }

        if validate {
            let issues = MetadataValidator::validate(&merged);
            for warning in &issues.warnings {
                tracing::warn!(%warning, "metadata warning");
            }
            for conflict in &issues.conflicts {
                tracing::warn!(%conflict, "metadata conflict");
            }
            if !issues.is_clean() {
                return Err(CoreError::Metadata {
                    message: issues.errors.join("; "),
                });
            }
        }

        let needs_doc_id = !matches!(merged.get("doc_id"), Some(Value::String(s)) if !s.is_empty() && s != "unknown");
        if needs_doc_id {
            let doc_id = self.generate_doc_id(&merged);
            merged.insert("doc_id".to_string(), Value::String(doc_id));
        }

        if !merged.contains_key("vector_id") {
            let doc_id = merged.get("doc_id").and_then(Value::as_str).unwrap_or("unknown");
            let chunk_index = merged.get("chunk_index").and_then(Value::as_u64).unwrap_or(0) as u32;
            merged.insert(
                "vector_id".to_string(),
                Value::String(Self::generate_vector_id(doc_id, chunk_index)),
            );
        }

        merged.insert(
            "_schema_version".to_string(),
            Value::from(self.config.schema_version),
        );

        let record: MetadataRecord = serde_json::from_value(Value::Object(merged))
            .map_err(|e| CoreError::Metadata { message: format!("failed to build record: {e}") })?;

        let errors = record.validate();
        if !errors.is_empty() {
            tracing::error!(?errors, "metadata record failed post-merge validation");
        }

        Ok(record)
    }

    /// Stamp a record with storage-time bookkeeping (`ingested_at`,
    /// `_schema_version`) and flatten it to a plain JSON map, the shape the
    /// storage layer actually persists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Metadata`] if the record fails to serialize,
    /// which only happens if `extras` contains a non-JSON-representable
    /// value (not possible through this crate's own constructors, but this
    /// guards against callers building a record by hand).
    pub fn prepare_for_storage(&self, record: &MetadataRecord) -> Result<Map<String, Value>, CoreError> {
        let mut record = record.clone();
        if record.ingested_at.is_none() {
            record.ingested_at = Some(Utc::now());
        }
        record.schema_version = self.config.schema_version;

        let value = serde_json::to_value(&record)
            .map_err(|e| CoreError::Metadata { message: format!("failed to serialize record for storage: {e}") })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => unreachable!("MetadataRecord always serializes to an object"),
        }
    }

    /// Reconstitute a [`MetadataRecord`] from whatever a storage backend
    /// handed back, migrating legacy shapes (nested `metadata`, deprecated
    /// key names, stringly-typed `chunk_index`) through
    /// [`MetadataValidator::normalize`] before deserializing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Metadata`] if, even after normalization, the
    /// stored map doesn't deserialize into a [`MetadataRecord`].
    pub fn recover_from_storage(&self, stored: Map<String, Value>) -> Result<MetadataRecord, CoreError> {
        let normalized = MetadataValidator::normalize(&stored);
        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| CoreError::Metadata { message: format!("failed to recover stored record: {e}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mgr() -> MetadataManager {
        MetadataManager::new(MetadataConfig::default())
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn generates_doc_id_from_file_path_when_missing() {
        let manager = mgr();
        let id = manager.generate_doc_id(&map(json!({"file_path": "/a/b/report.pdf"})));
        assert_eq!(id, "doc_report");
    }

    #[test]
    fn doc_id_generation_is_cached() {
        let manager = mgr();
        let meta = map(json!({"file_path": "/a/b/report.pdf"}));
        let first = manager.generate_doc_id(&meta);
        let second = manager.generate_doc_id(&meta);
        assert_eq!(first, second);
    }

    #[test]
    fn merge_resolves_conflicts_and_fills_ids() {
        let manager = mgr();
        let record = manager
            .merge_metadata(&[map(json!({"content": "hello world", "filename": "a.txt"}))], true)
            .unwrap();
        assert_eq!(record.text, "hello world");
        assert!(record.doc_id.starts_with("doc_a"));
        assert_eq!(record.vector_id, format!("{}_chunk_0", record.doc_id));
    }

    #[test]
    fn merge_fails_without_text() {
        let manager = mgr();
        let result = manager.merge_metadata(&[map(json!({"filename": "a.txt"}))], true);
        assert!(result.is_err());
    }

    #[test]
    fn prepare_for_storage_stamps_ingested_at_and_schema_version() {
        let manager = mgr();
        let record = manager.merge_metadata(&[map(json!({"text": "hello", "filename": "a.txt"}))], true).unwrap();
        let stored = manager.prepare_for_storage(&record).unwrap();
        assert!(stored.contains_key("ingested_at"));
        assert_eq!(stored.get("_schema_version").unwrap(), &Value::from(manager.config.schema_version));
    }

    #[test]
    fn recover_from_storage_migrates_legacy_shape() {
        let manager = mgr();
        let legacy = map(json!({
            "vector_id": "doc_a_chunk_0",
            "doc_id": "doc_a",
            "content": "hello world",
            "chunk_id": "2",
        }));
        let record = manager.recover_from_storage(legacy).unwrap();
        assert_eq!(record.text, "hello world");
        assert_eq!(record.chunk_index, 2);
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let manager = mgr();
        let record = manager
            .merge_metadata(
                &[map(json!({"text": "first", "title": "A"})), map(json!({"text": "second"}))],
                true,
            )
            .unwrap();
        assert_eq!(record.text, "second");
        assert_eq!(record.title.as_deref(), Some("A"));
    }
}
