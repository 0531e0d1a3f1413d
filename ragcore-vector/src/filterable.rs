//! A metadata-filtered view over a [`crate::index::VectorIndex`]: constraint
//! trees (exact match / "any of" / range / text-contains / text-match)
//! evaluated against a record's flattened metadata, plus cursor-based
//! scroll pagination that doesn't involve a similarity search at all, and
//! the payload auto-enrichment (`doc_type`, `has_incident`, `incident_ids`)
//! applied on write.
//!
//! Every clause in a filter map is ANDed together. A value that is a JSON
//! array means "match any of these"; an object with a `gte`/`lte` key means
//! a numeric range; an object with a `contains` key means a case-insensitive
//! substring match; an object with a `match` key means a case-insensitive
//! whole-word match; anything else is an exact match. This mirrors the
//! `FieldCondition` shapes (`MatchAny`, `Range`, `MatchText`, `MatchValue`)
//! the metadata filtering here is modeled on.

use crate::index::VectorIndex;
use crate::types::{StorageStats, VectorResult};
use ragcore_core::error::CoreError;
use ragcore_metadata::MetadataRecord;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Evaluate one filter map against a flattened metadata payload. `None`
/// metadata never matches a non-empty filter.
#[must_use]
pub fn matches_filter(metadata: Option<&HashMap<String, Value>>, filter: &HashMap<String, Value>) -> bool {
    let Some(metadata) = metadata else {
        return filter.is_empty();
    };
    filter.iter().all(|(key, expected)| match expected {
        Value::Array(options) => metadata.get(key).is_some_and(|actual| options.contains(actual)),
        Value::Object(obj) if obj.contains_key("contains") => {
            let Some(needle) = obj.get("contains").and_then(Value::as_str) else {
                return false;
            };
            metadata
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|haystack| haystack.to_lowercase().contains(&needle.to_lowercase()))
        }
        Value::Object(obj) if obj.contains_key("match") => {
            let Some(needle) = obj.get("match").and_then(Value::as_str) else {
                return false;
            };
            metadata
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|haystack| haystack.split_whitespace().any(|word| word.eq_ignore_ascii_case(needle)))
        }
        Value::Object(range) if range.contains_key("gte") || range.contains_key("lte") => {
            let Some(actual) = metadata.get(key).and_then(Value::as_f64) else {
                return false;
            };
            let above_min = range.get("gte").and_then(Value::as_f64).map_or(true, |gte| actual >= gte);
            let below_max = range.get("lte").and_then(Value::as_f64).map_or(true, |lte| actual <= lte);
            above_min && below_max
        }
        other => metadata.get(key) == Some(other),
    })
}

fn incident_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"INC\d{6}").expect("incident id pattern is valid regex"))
}

/// Classify a record's text into one of the recognized document types by
/// keyword presence. Falls back to `"other"` when nothing matches.
#[must_use]
pub fn derive_doc_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("incident") {
        "incident"
    } else if lower.contains("change request") || lower.contains("change order") || lower.contains("rfc") {
        "change"
    } else if lower.contains("problem record") || lower.contains("root cause") {
        "problem"
    } else if lower.contains("service request") || lower.contains("request ticket") {
        "request"
    } else if lower.contains("task") {
        "task"
    } else {
        "other"
    }
}

/// Stamp `doc_type`, `has_incident` and `incident_ids` onto a record's
/// `extras` from its text, ahead of storage. Idempotent: re-running it on an
/// already-enriched record just recomputes the same values.
pub fn enrich_metadata(record: &mut MetadataRecord) {
    record.extras.insert("doc_type".to_string(), Value::String(derive_doc_type(&record.text).to_string()));

    let incident_ids: Vec<String> = incident_id_pattern().find_iter(&record.text).map(|m| m.as_str().to_string()).collect();
    record.extras.insert("has_incident".to_string(), Value::Bool(!incident_ids.is_empty()));
    if incident_ids.is_empty() {
        record.extras.remove("incident_ids");
    } else {
        record
            .extras
            .insert("incident_ids".to_string(), Value::Array(incident_ids.into_iter().map(Value::String).collect()));
    }
}

fn flatten_record(record: &MetadataRecord) -> HashMap<String, Value> {
    serde_json::to_value(record)
        .ok()
        .and_then(|v| if let Value::Object(map) = v { Some(map.into_iter().collect()) } else { None })
        .unwrap_or_default()
}

/// Cursor over a scroll through every live record, ordered by vector id.
#[derive(Debug, Clone, Default)]
pub struct ScrollCursor {
    after_id: Option<String>,
}

/// A page returned from [`FilterableVectorStore::scroll`].
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub records: Vec<MetadataRecord>,
    pub next_cursor: Option<ScrollCursor>,
}

/// Filterable, paginated access to an index's live metadata, independent of
/// vector similarity.
pub struct FilterableVectorStore {
    index: Arc<VectorIndex>,
}

impl FilterableVectorStore {
    #[must_use]
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    /// Run a similarity search and keep only the hits whose metadata
    /// satisfies `filter`. Over-fetches (`k * 4`, capped at `4096`) since
    /// filtering happens after the ANN search returns its candidates.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the underlying search.
    pub fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        filter: &HashMap<String, Value>,
    ) -> Result<Vec<VectorResult>, CoreError> {
        let over_fetch = (k.saturating_mul(4)).clamp(k, 4096);
        let candidates = self.index.search(query, over_fetch)?;
        Ok(candidates
            .into_iter()
            .filter(|r| matches_filter(r.metadata.as_ref(), filter))
            .take(k)
            .collect())
    }

    /// Scroll through every live record matching `filter`, `limit` at a
    /// time, ordered by vector id. Pass the previous page's
    /// [`ScrollPage::next_cursor`] back in to continue.
    #[must_use]
    pub fn scroll(&self, filter: &HashMap<String, Value>, cursor: Option<&ScrollCursor>, limit: usize) -> ScrollPage {
        let mut records = self.index.live_records_sorted_by_id();
        if let Some(cursor) = cursor {
            if let Some(after) = &cursor.after_id {
                records.retain(|r| r.vector_id.as_str() > after.as_str());
            }
        }
        records.retain(|r| matches_filter(Some(&flatten_record(r)), filter));

        let has_more = records.len() > limit;
        records.truncate(limit);
        let next_cursor = if has_more {
            records.last().map(|r| ScrollCursor { after_id: Some(r.vector_id.clone()) })
        } else {
            None
        };
        ScrollPage { records, next_cursor }
    }

    /// Count live records matching `filter`, grouped by their `doc_type`
    /// (`"other"` for records with none).
    #[must_use]
    pub fn aggregate_by_doc_type(&self, filter: &HashMap<String, Value>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for record in self.index.live_records_sorted_by_id() {
            let flattened = flatten_record(&record);
            if !matches_filter(Some(&flattened), filter) {
                continue;
            }
            let doc_type = record.extras.get("doc_type").and_then(Value::as_str).unwrap_or("other").to_string();
            *counts.entry(doc_type).or_insert(0usize) += 1;
        }
        counts
    }

    #[must_use]
    pub fn stats(&self) -> StorageStats {
        self.index.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_match_requires_equal_value() {
        let mut metadata = HashMap::new();
        metadata.insert("doc_type".to_string(), json!("incident"));
        let mut filter = HashMap::new();
        filter.insert("doc_type".to_string(), json!("incident"));
        assert!(matches_filter(Some(&metadata), &filter));
        filter.insert("doc_type".to_string(), json!("manual"));
        assert!(!matches_filter(Some(&metadata), &filter));
    }

    #[test]
    fn any_of_matches_list_membership() {
        let mut metadata = HashMap::new();
        metadata.insert("source_type".to_string(), json!("pdf"));
        let mut filter = HashMap::new();
        filter.insert("source_type".to_string(), json!(["pdf", "docx"]));
        assert!(matches_filter(Some(&metadata), &filter));
    }

    #[test]
    fn range_matches_inclusive_bounds() {
        let mut metadata = HashMap::new();
        metadata.insert("chunk_index".to_string(), json!(5));
        let mut filter = HashMap::new();
        filter.insert("chunk_index".to_string(), json!({"gte": 1, "lte": 10}));
        assert!(matches_filter(Some(&metadata), &filter));
        filter.insert("chunk_index".to_string(), json!({"gte": 6}));
        assert!(!matches_filter(Some(&metadata), &filter));
    }

    #[test]
    fn text_contains_is_case_insensitive_substring() {
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), json!("Building A had a power outage"));
        let mut filter = HashMap::new();
        filter.insert("text".to_string(), json!({"contains": "POWER"}));
        assert!(matches_filter(Some(&metadata), &filter));
        filter.insert("text".to_string(), json!({"contains": "water"}));
        assert!(!matches_filter(Some(&metadata), &filter));
    }

    #[test]
    fn text_match_requires_a_whole_word() {
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), json!("floor 3 elevator"));
        let mut filter = HashMap::new();
        filter.insert("text".to_string(), json!({"match": "floor"}));
        assert!(matches_filter(Some(&metadata), &filter));
        filter.insert("text".to_string(), json!({"match": "floo"}));
        assert!(!matches_filter(Some(&metadata), &filter));
    }

    #[test]
    fn enrich_metadata_extracts_incident_ids_and_doc_type() {
        let mut record = MetadataRecord { text: "Incident INC030001 and INC030002 were linked".to_string(), ..Default::default() };
        enrich_metadata(&mut record);
        assert_eq!(record.extras.get("doc_type").unwrap(), "incident");
        assert_eq!(record.extras.get("has_incident").unwrap(), true);
        let ids = record.extras.get("incident_ids").unwrap().as_array().unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn enrich_metadata_flags_no_incident_for_unrelated_text() {
        let mut record = MetadataRecord { text: "Quarterly budget summary".to_string(), ..Default::default() };
        enrich_metadata(&mut record);
        assert_eq!(record.extras.get("doc_type").unwrap(), "other");
        assert_eq!(record.extras.get("has_incident").unwrap(), false);
        assert!(!record.extras.contains_key("incident_ids"));
    }
}
