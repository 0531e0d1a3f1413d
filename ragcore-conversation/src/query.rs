//! Query enhancement (intent detection, keyword extraction, expansion) and
//! the multi-strategy query engine that dispatches a conversation turn's
//! question to semantic search, filtered search, or both.

use ragcore_core::error::CoreError;
use ragcore_core::traits::Embedder;
use ragcore_vector::{VectorQuery, VectorResult, VectorStorage};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Factual,
    Procedural,
    Comparative,
    Causal,
    Temporal,
    Location,
    General,
}

/// The detected shape of a user's question, used to steer retrieval
/// strategy selection.
#[derive(Debug, Clone)]
pub struct QueryIntent {
    pub query_type: QueryType,
    pub confidence: f32,
    pub keywords: Vec<String>,
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are", "was", "were", "be", "been",
            "being", "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "what", "how", "when",
            "where", "why",
        ]
        .into_iter()
        .collect()
    })
}

fn about_topic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\babout\s+(.+)$").expect("about-topic pattern is valid regex"))
}

/// Pulls the trailing clause out of a query like "tell me more about that
/// elevator" → `Some("that elevator")`.
#[must_use]
pub fn extract_about_topic(query: &str) -> Option<String> {
    let captured = about_topic_pattern().captures(query)?.get(1)?.as_str().trim().trim_end_matches(|c: char| matches!(c, '.' | '?' | '!'));
    if captured.is_empty() {
        None
    } else {
        Some(captured.to_string())
    }
}

fn intent_patterns() -> &'static [(QueryType, Vec<Regex>)] {
    static PATTERNS: OnceLock<Vec<(QueryType, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |patterns: &[&str]| patterns.iter().map(|p| Regex::new(p).expect("intent pattern is valid regex")).collect();
        vec![
            (QueryType::Factual, compile(&[r"(?i)\b(what is|define|definition of|meaning of|explain)\b", r"(?i)\b(describe|tell me about)\b"])),
            (QueryType::Procedural, compile(&[r"(?i)\b(how to|how do|how can|steps to|process of)\b", r"(?i)\b(guide|tutorial|instructions)\b"])),
            (QueryType::Comparative, compile(&[r"(?i)\b(compare|comparison|difference|versus|vs|better than)\b"])),
            (QueryType::Causal, compile(&[r"(?i)\b(why|because|cause|reason|due to)\b", r"(?i)\b(what causes|what leads to)\b"])),
            (QueryType::Temporal, compile(&[r"(?i)\b(when|timeline|history|chronology)\b", r"(?i)\b(before|after|during|since)\b"])),
            (QueryType::Location, compile(&[r"(?i)\b(where|location|place|geography)\b", r"(?i)\b(in which|at what)\b"])),
        ]
    })
}

/// Detects intent and extracts keywords from raw user queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEnhancer;

impl QueryEnhancer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn detect_intent(&self, query: &str) -> QueryIntent {
        let detected: Vec<QueryType> =
            intent_patterns().iter().filter(|(_, patterns)| patterns.iter().any(|p| p.is_match(query))).map(|(t, _)| *t).collect();

        let (query_type, confidence) = match detected.as_slice() {
            [] => (QueryType::General, 0.5),
            [only] => (*only, 0.8),
            [first, ..] => (*first, 0.6),
        };

        QueryIntent { query_type, confidence, keywords: self.extract_keywords(query) }
    }

    /// Tokenize, drop stop-words and short tokens, and append 2-word
    /// phrases built from adjacent non-stop-word tokens.
    #[must_use]
    pub fn extract_keywords(&self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return Vec::new();
        }
        let words: Vec<String> = query.to_lowercase().split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string()).collect();

        let mut keywords: Vec<String> = words.iter().filter(|w| !w.is_empty() && !stop_words().contains(w.as_str()) && w.len() > 2).cloned().collect();

        for pair in words.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if !a.is_empty() && !b.is_empty() && !stop_words().contains(a.as_str()) && !stop_words().contains(b.as_str()) {
                let phrase = format!("{a} {b}");
                if phrase.len() > 5 {
                    keywords.push(phrase);
                }
            }
        }

        keywords
    }
}

/// Which retrieval strategies a single query used, for transparency in the
/// returned result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    Semantic,
    Filtered,
    Hybrid,
}

/// One query's retrieved results plus the confidence the engine has in
/// them.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub results: Vec<VectorResult>,
    pub strategy: RetrievalStrategy,
    pub confidence: f32,
    pub intent: QueryIntent,
}

/// Dispatches a query to one or more retrieval strategies over a vector
/// store, combining semantic search with an optional metadata filter
/// extracted from the query's detected intent.
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStorage>,
    enhancer: QueryEnhancer,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").field("embedder_model", &self.embedder.model_name()).finish_non_exhaustive()
    }
}

impl QueryEngine {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStorage>) -> Self {
        Self { embedder, store, enhancer: QueryEnhancer::new() }
    }

    /// Embed the query and run a similarity search, optionally narrowed
    /// with a metadata filter the caller has already derived (e.g. from
    /// conversation topic tracking).
    ///
    /// # Errors
    ///
    /// Propagates embedding or vector-store failures.
    pub async fn process_query(&self, query: &str, k: usize, filter: Option<HashMap<String, Value>>) -> Result<QueryOutcome, CoreError> {
        let intent = self.enhancer.detect_intent(query);
        let embedding = self.embedder.embed_text(query).await?;

        let strategy = if filter.is_some() { RetrievalStrategy::Hybrid } else { RetrievalStrategy::Semantic };
        let mut vector_query = VectorQuery::new(embedding, k);
        if let Some(filter) = filter {
            vector_query = vector_query.with_filter(filter);
        }

        let results = self.store.search(&vector_query).await?;
        let confidence = Self::calculate_confidence(&results);

        Ok(QueryOutcome { results, strategy, confidence, intent })
    }

    /// Runs the search phase's retrieval cascade: up to four strategies,
    /// tried in order, stopping at the first that returns a non-empty
    /// result set.
    ///
    /// 1. `processed_query` (the contextually-enriched query, if any).
    /// 2. `original_query`, when it differs from the processed query.
    /// 3. The clause following "about" in either query.
    /// 4. `topics_discussed`, most-recent first, joined into one query.
    ///
    /// # Errors
    ///
    /// Propagates embedding or vector-store failures from the last
    /// strategy attempted.
    pub async fn search_cascade(
        &self,
        processed_query: &str,
        original_query: &str,
        topics_discussed: &[String],
        k: usize,
        filter: Option<HashMap<String, Value>>,
    ) -> Result<QueryOutcome, CoreError> {
        let mut candidates = vec![processed_query.to_string()];
        if original_query != processed_query && !original_query.is_empty() {
            candidates.push(original_query.to_string());
        }
        if let Some(topic) = extract_about_topic(processed_query).or_else(|| extract_about_topic(original_query)) {
            candidates.push(topic);
        }
        if !topics_discussed.is_empty() {
            candidates.push(topics_discussed.iter().rev().cloned().collect::<Vec<_>>().join(" "));
        }

        let last_index = candidates.len() - 1;
        let mut outcome = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let attempt = self.process_query(candidate, k, filter.clone()).await?;
            let exhausted_all = index == last_index;
            let found_results = !attempt.results.is_empty();
            outcome = Some(attempt);
            if found_results || exhausted_all {
                break;
            }
        }
        Ok(outcome.expect("candidates always has at least processed_query"))
    }

    /// Confidence heuristic: the average similarity score of returned
    /// results, or zero when nothing came back.
    #[must_use]
    pub fn calculate_confidence(results: &[VectorResult]) -> f32 {
        if results.is_empty() {
            return 0.0;
        }
        results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_procedural_intent() {
        let enhancer = QueryEnhancer::new();
        let intent = enhancer.detect_intent("How do I configure the vector index?");
        assert_eq!(intent.query_type, QueryType::Procedural);
    }

    #[test]
    fn extracts_keywords_without_stop_words() {
        let enhancer = QueryEnhancer::new();
        let keywords = enhancer.extract_keywords("what is the vector index backend");
        assert!(keywords.iter().any(|k| k == "vector"));
        assert!(!keywords.iter().any(|k| k == "the"));
    }

    #[test]
    fn confidence_is_zero_for_empty_results() {
        assert_eq!(QueryEngine::calculate_confidence(&[]), 0.0);
    }

    #[test]
    fn extracts_topic_clause_after_about() {
        assert_eq!(extract_about_topic("tell me more about that elevator"), Some("that elevator".to_string()));
        assert_eq!(extract_about_topic("what happened?"), None);
    }

    #[test]
    fn about_topic_strips_trailing_punctuation() {
        assert_eq!(extract_about_topic("what about floor 3?"), Some("floor 3".to_string()));
    }
}

#[cfg(test)]
mod cascade_tests {
    use super::*;
    use async_trait::async_trait;
    use ragcore_core::traits::Embedder;
    use ragcore_vector::{StorageStats, VectorStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic stand-in for a real embedding: distinct query text
    /// maps to a distinct vector, so a fake store can tell candidates apart
    /// without needing the raw query text on `VectorQuery`.
    fn hash_embed(text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        vec![(hasher.finish() % 1_000_003) as f32, 0.0, 0.0, 0.0]
    }

    struct StubEmbedder;
    #[async_trait]
    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dimension(&self) -> usize {
            4
        }
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(hash_embed(text))
        }
    }

    /// Returns results only once the query text matches `hits_on`, so tests
    /// can assert which cascade strategy actually produced a result.
    struct SelectiveStore {
        hits_on: &'static str,
        calls: AtomicUsize,
    }
    #[async_trait]
    impl VectorStorage for SelectiveStore {
        async fn insert(&self, _items: Vec<(Vec<f32>, ragcore_metadata::MetadataRecord)>) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }
        async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorResult>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.vector == hash_embed(self.hits_on) {
                Ok(vec![VectorResult { id: "v1".to_string(), score: 0.9, metadata: None }])
            } else {
                Ok(vec![])
            }
        }
        async fn delete(&self, _ids: &[String]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn stats(&self) -> Result<StorageStats, CoreError> {
            unimplemented!()
        }
        async fn get_metadata(&self, _id: &str) -> Result<Option<ragcore_metadata::MetadataRecord>, CoreError> {
            Ok(None)
        }
        async fn update_metadata(&self, _id: &str, _updates: serde_json::Map<String, serde_json::Value>) -> Result<(), CoreError> {
            Ok(())
        }
        async fn find_by_doc_path(&self, _doc_path: &str) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }
        async fn delete_by_doc_path(&self, _doc_path: &str) -> Result<usize, CoreError> {
            Ok(0)
        }
        async fn find_by_path_identity(&self, _doc_path: Option<&str>, _filename: Option<&str>, _file_path: Option<&str>) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }
        async fn clear(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn cascade_stops_at_first_non_empty_strategy() {
        let store = Arc::new(SelectiveStore { hits_on: "about that elevator", calls: AtomicUsize::new(0) });
        let engine = QueryEngine::new(Arc::new(StubEmbedder), store.clone());
        let outcome = engine
            .search_cascade("tell me more about that elevator", "tell me more about that elevator", &["floor 3".to_string()], 8, None)
            .await
            .unwrap();
        assert!(!outcome.results.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cascade_falls_through_to_topic_substring() {
        let store = Arc::new(SelectiveStore { hits_on: "that elevator", calls: AtomicUsize::new(0) });
        let engine = QueryEngine::new(Arc::new(StubEmbedder), store.clone());
        let outcome = engine
            .search_cascade("tell me more about that elevator", "tell me more about that elevator", &["floor 3".to_string()], 8, None)
            .await
            .unwrap();
        assert!(!outcome.results.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cascade_falls_through_to_stored_topics_when_nothing_else_matches() {
        let store = Arc::new(SelectiveStore { hits_on: "elevator floor 3", calls: AtomicUsize::new(0) });
        let engine = QueryEngine::new(Arc::new(StubEmbedder), store.clone());
        let outcome =
            engine.search_cascade("what about that", "what about that", &["floor 3".to_string(), "elevator".to_string()], 8, None).await.unwrap();
        assert!(!outcome.results.is_empty());
        assert_eq!(outcome.results[0].id, "v1");
    }

    #[tokio::test]
    async fn cascade_returns_empty_when_no_strategy_matches() {
        let store = Arc::new(SelectiveStore { hits_on: "nothing will match this", calls: AtomicUsize::new(0) });
        let engine = QueryEngine::new(Arc::new(StubEmbedder), store.clone());
        let outcome = engine.search_cascade("a query", "a different query", &["topic".to_string()], 8, None).await.unwrap();
        assert!(outcome.results.is_empty());
    }
}
