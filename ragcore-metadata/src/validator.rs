//! Validates and normalizes raw, caller-supplied metadata maps before they
//! become a [`crate::record::MetadataRecord`].

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Conflict-group pairs and which member wins when both are present.
const CONFLICTING_KEYS: &[(&str, &str, &str)] = &[
    ("filename", "file_name", "filename"),
    ("doc_id", "document_id", "doc_id"),
    ("text", "content", "text"),
    ("chunk_index", "chunk_id", "chunk_index"),
];

/// Deprecated top-level keys and the message explaining their replacement.
const DEPRECATED_KEYS: &[(&str, &str)] = &[
    ("metadata", "Nested metadata is deprecated. Use flat structure."),
    ("file_name", "Use 'filename' instead of 'file_name'"),
    ("document_id", "Use 'doc_id' instead of 'document_id'"),
    ("content", "Use 'text' instead of 'content'"),
    ("chunk_id", "Use 'chunk_index' instead of 'chunk_id'"),
];

/// Outcome of [`MetadataValidator::validate`].
#[derive(Debug, Default, Clone)]
pub struct ValidationIssues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub conflicts: Vec<String>,
}

impl ValidationIssues {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stateless validation/normalization rules applied to raw metadata maps.
pub struct MetadataValidator;

impl MetadataValidator {
    /// Inspect `metadata` and report conflicts, deprecated keys, missing
    /// required fields and type mismatches without mutating it.
    #[must_use]
    pub fn validate(metadata: &Map<String, Value>) -> ValidationIssues {
        let mut issues = ValidationIssues::default();

        if let Some(nested) = metadata.get("metadata") {
            if nested.is_object() {
                issues.errors.push(
                    "Nested 'metadata' field detected. This causes double flattening. Use flat structure."
                        .to_string(),
                );
            } else {
                issues
                    .warnings
                    .push("'metadata' field should be removed. Use flat structure.".to_string());
            }
        }

        for (a, b, preferred) in CONFLICTING_KEYS {
            if metadata.contains_key(*a) && metadata.contains_key(*b) {
                issues
                    .conflicts
                    .push(format!("Conflicting keys ('{a}', '{b}'). Will use '{preferred}'."));
            }
        }

        for (key, message) in DEPRECATED_KEYS {
            if metadata.contains_key(*key) {
                issues.warnings.push(format!("Deprecated key '{key}': {message}"));
            }
        }

        match metadata.get("text") {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => issues.errors.push("Missing or empty required field: text".to_string()),
        }

        for field in ["chunk_index", "chunk_size", "total_chunks", "version"] {
            if let Some(value) = metadata.get(field) {
                if !value.is_i64() && !value.is_u64() {
                    if value.as_str().and_then(|s| s.parse::<i64>().ok()).is_some() {
                        issues.warnings.push(format!("Converted '{field}' to integer"));
                    } else {
                        issues
                            .errors
                            .push(format!("'{field}' must be an integer, got {value}"));
                    }
                }
            }
        }
        if let Some(value) = metadata.get("deleted") {
            if !value.is_boolean() {
                issues.errors.push(format!("'deleted' must be a bool, got {value}"));
            }
        }

        if let Some(Value::String(text)) = metadata.get("text") {
            if text.len() > 100_000 {
                issues
                    .warnings
                    .push(format!("Text field is very large ({} chars). Consider chunking.", text.len()));
            }
        }

        issues
    }

    /// Produce a normalized copy of `metadata`: nested `metadata` objects
    /// flattened, conflict groups resolved to their preferred key,
    /// deprecated keys mapped onto their replacement, and a handful of
    /// fields given sane defaults.
    #[must_use]
    pub fn normalize(metadata: &Map<String, Value>) -> Map<String, Value> {
        let mut normalized = Map::new();

        if let Some(Value::Object(nested)) = metadata.get("metadata") {
            warn!("flattening nested metadata structure - this should be avoided");
            for (key, value) in nested {
                if key == "metadata" || !metadata.contains_key(key) {
                    normalized.insert(key.clone(), value.clone());
                } else {
                    debug!(key, "skipping nested key - conflicts with top-level key");
                }
            }
        }

        for (key, value) in metadata {
            if key != "metadata" {
                normalized.insert(key.clone(), value.clone());
            }
        }

        for (a, b, preferred) in CONFLICTING_KEYS {
            if normalized.contains_key(*a) && normalized.contains_key(*b) {
                let kept = normalized.get(*preferred).cloned();
                for key in [a, b] {
                    if key != preferred {
                        normalized.remove(*key);
                    }
                }
                if let Some(value) = kept {
                    normalized.insert((*preferred).to_string(), value);
                }
            }
        }

        if normalized.contains_key("file_name") && !normalized.contains_key("filename") {
            if let Some(v) = normalized.remove("file_name") {
                normalized.insert("filename".to_string(), v);
            }
        }
        if normalized.contains_key("document_id") && !normalized.contains_key("doc_id") {
            if let Some(v) = normalized.remove("document_id") {
                normalized.insert("doc_id".to_string(), v);
            }
        }
        if normalized.contains_key("content") && !normalized.contains_key("text") {
            if let Some(v) = normalized.remove("content") {
                normalized.insert("text".to_string(), v);
            }
        }
        if normalized.contains_key("chunk_id") && !normalized.contains_key("chunk_index") {
            if let Some(v) = normalized.remove("chunk_id") {
                let idx = v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())).unwrap_or(0);
                normalized.insert("chunk_index".to_string(), Value::from(idx));
            }
        }

        normalized
            .entry("chunk_index")
            .or_insert_with(|| Value::from(0));
        normalized
            .entry("created_at")
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));
        normalized
            .entry("source_type")
            .or_insert_with(|| Value::String("unknown".to_string()));

        if let Some(tags) = normalized.get("tags").cloned() {
            let normalized_tags = match tags {
                Value::String(s) if s.contains(',') => {
                    Value::Array(s.split(',').map(|t| Value::String(t.trim().to_string())).collect())
                }
                Value::String(s) if s.is_empty() => Value::Array(vec![]),
                Value::String(s) => Value::Array(vec![Value::String(s)]),
                Value::Array(_) => tags,
                _ => Value::Array(vec![]),
            };
            normalized.insert("tags".to_string(), normalized_tags);
        }

        normalized.retain(|key, value| {
            if value.is_null() {
                return false;
            }
            if let Value::String(s) = value {
                if s.is_empty() {
                    return false;
                }
            }
            if let Value::Array(arr) = value {
                if arr.is_empty() && key != "tags" {
                    return false;
                }
            }
            true
        });

        info!(fields = normalized.len(), "normalized metadata map");
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn flags_missing_text() {
        let issues = MetadataValidator::validate(&map(json!({})));
        assert!(issues.errors.iter().any(|e| e.contains("text")));
    }

    #[test]
    fn flags_nested_metadata() {
        let issues = MetadataValidator::validate(&map(json!({"metadata": {"a": 1}, "text": "x"})));
        assert!(!issues.errors.is_empty());
    }

    #[test]
    fn flags_conflicting_keys() {
        let issues =
            MetadataValidator::validate(&map(json!({"filename": "a", "file_name": "b", "text": "x"})));
        assert_eq!(issues.conflicts.len(), 1);
    }

    #[test]
    fn normalize_resolves_conflicts_to_preferred_key() {
        let normalized =
            MetadataValidator::normalize(&map(json!({"content": "hello", "chunk_id": "3"})));
        assert_eq!(normalized.get("text").unwrap(), "hello");
        assert_eq!(normalized.get("chunk_index").unwrap(), 3);
        assert!(!normalized.contains_key("content"));
        assert!(!normalized.contains_key("chunk_id"));
    }

    #[test]
    fn normalize_splits_comma_separated_tags() {
        let normalized = MetadataValidator::normalize(&map(json!({"tags": "a, b,c", "text": "x"})));
        let tags = normalized.get("tags").unwrap().as_array().unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn normalize_flattens_nested_metadata_without_overwriting_top_level() {
        let normalized = MetadataValidator::normalize(&map(
            json!({"text": "x", "metadata": {"text": "should not win", "author": "nested"}}),
        ));
        assert_eq!(normalized.get("text").unwrap(), "x");
        assert_eq!(normalized.get("author").unwrap(), "nested");
        assert!(!normalized.contains_key("metadata"));
    }
}
