//! `ConflictResolver`: reconciles multiple search strategies' results when
//! they disagree, and checks new information against what's already known.

use regex::Regex;
use std::sync::OnceLock;

/// One source passage attached to a search result, scored and attributed
/// to the strategy that found it.
#[derive(Debug, Clone)]
pub struct SourcePassage {
    pub source: String,
    pub text: String,
    pub score: f32,
    pub strategy_used: Option<String>,
    pub may_conflict: bool,
}

/// The result a single retrieval strategy produced.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub sources: Vec<SourcePassage>,
    pub has_conflicts: bool,
    pub conflict_count: usize,
    pub conflict_resolution: Option<ResolutionStrategy>,
    pub merged_from: usize,
}

/// One strategy's attempt, paired with the strategy name that produced it.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub strategy: String,
    pub result: SearchResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    SourceReliability,
    Recency,
    HighestScore,
}

/// A detected disagreement between two search attempts' source sets.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub attempt1: usize,
    pub attempt2: usize,
    pub source1: String,
    pub source2: String,
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d+\b").expect("number pattern is a valid regex"))
}

const CONTRADICTIONS: &[(&str, &str)] =
    &[("is not", "is"), ("are not", "are"), ("cannot", "can"), ("does not", "does"), ("no", "yes"), ("false", "true")];

fn information_conflicts(info1: &str, info2: &str) -> bool {
    let info1_lower = info1.to_lowercase();
    let info2_lower = info2.to_lowercase();

    let numbers1: Vec<&str> = number_pattern().find_iter(info1).map(|m| m.as_str()).collect();
    let numbers2: Vec<&str> = number_pattern().find_iter(info2).map(|m| m.as_str()).collect();
    if !numbers1.is_empty() && !numbers2.is_empty() && numbers1 != numbers2 {
        return true;
    }

    CONTRADICTIONS
        .iter()
        .any(|(neg, pos)| (info1_lower.contains(neg) && info2_lower.contains(pos)) || (info1_lower.contains(pos) && info2_lower.contains(neg)))
}

/// Reconciles conflicting search results and screens new information
/// against what's already considered settled.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Merge or reconcile a set of strategy attempts into one result.
    /// Returns `None` when given no attempts at all.
    #[must_use]
    pub fn resolve_search_conflicts(&self, search_attempts: Vec<SearchAttempt>) -> Option<(SearchResult, Vec<Conflict>)> {
        if search_attempts.is_empty() {
            return None;
        }
        if search_attempts.len() == 1 {
            let mut attempts = search_attempts;
            return Some((attempts.remove(0).result, vec![]));
        }

        tracing::info!(attempts = search_attempts.len(), "resolving conflicts between search attempts");

        let conflicts = Self::identify_conflicts(&search_attempts);
        if conflicts.is_empty() {
            return Some((Self::merge_search_results(&search_attempts), vec![]));
        }

        let strategy = Self::determine_resolution_strategy();
        let resolved = Self::apply_resolution_strategy(&search_attempts, &conflicts, strategy);
        Some((resolved, conflicts))
    }

    /// Compare new information against known statements, returning the
    /// subset that conflicts with it.
    #[must_use]
    pub fn validate_information_consistency<'a>(new_info: &str, existing_info: &[&'a str]) -> (bool, Vec<&'a str>) {
        let conflicts: Vec<&str> = existing_info.iter().copied().filter(|existing| information_conflicts(new_info, existing)).collect();
        (conflicts.is_empty(), conflicts)
    }

    fn identify_conflicts(attempts: &[SearchAttempt]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for i in 0..attempts.len() {
            for j in (i + 1)..attempts.len() {
                let sources1 = &attempts[i].result.sources;
                let sources2 = &attempts[j].result.sources;
                if sources1.is_empty() || sources2.is_empty() {
                    continue;
                }
                let names1: std::collections::HashSet<&str> = sources1.iter().map(|s| s.source.as_str()).collect();
                let names2: std::collections::HashSet<&str> = sources2.iter().map(|s| s.source.as_str()).collect();
                if names1.intersection(&names2).next().is_some() {
                    continue;
                }
                if let Some((source1, source2)) = Self::analyze_source_conflict(sources1, sources2) {
                    conflicts.push(Conflict { attempt1: i, attempt2: j, source1, source2 });
                }
            }
        }
        conflicts
    }

    fn analyze_source_conflict(sources1: &[SourcePassage], sources2: &[SourcePassage]) -> Option<(String, String)> {
        for s1 in sources1.iter().take(2) {
            for s2 in sources2.iter().take(2) {
                if information_conflicts(&s1.text, &s2.text) {
                    return Some((s1.source.clone(), s2.source.clone()));
                }
            }
        }
        None
    }

    const fn determine_resolution_strategy() -> ResolutionStrategy {
        ResolutionStrategy::SourceReliability
    }

    fn apply_resolution_strategy(attempts: &[SearchAttempt], conflicts: &[Conflict], strategy: ResolutionStrategy) -> SearchResult {
        match strategy {
            ResolutionStrategy::SourceReliability => {
                let mut best = attempts
                    .iter()
                    .max_by(|a, b| Self::source_reliability(&a.result).total_cmp(&Self::source_reliability(&b.result)))
                    .map(|a| a.result.clone())
                    .unwrap_or_default();
                Self::mark_conflicts(&mut best, conflicts);
                best
            }
            ResolutionStrategy::Recency => attempts.last().map(|a| a.result.clone()).unwrap_or_default(),
            ResolutionStrategy::HighestScore => attempts
                .iter()
                .filter(|a| !a.result.sources.is_empty())
                .max_by(|a, b| Self::average_score(&a.result).total_cmp(&Self::average_score(&b.result)))
                .map(|a| a.result.clone())
                .unwrap_or_else(|| attempts[0].result.clone()),
        }
    }

    fn source_reliability(result: &SearchResult) -> f32 {
        if result.sources.is_empty() {
            return 0.0;
        }
        let scores: Vec<f32> = result
            .sources
            .iter()
            .map(|s| {
                let name_lower = s.source.to_lowercase();
                if name_lower.contains("official") {
                    s.score * 1.2
                } else if name_lower.contains("verified") {
                    s.score * 1.1
                } else {
                    s.score
                }
            })
            .collect();
        scores.iter().sum::<f32>() / scores.len() as f32
    }

    fn average_score(result: &SearchResult) -> f32 {
        if result.sources.is_empty() {
            return 0.0;
        }
        result.sources.iter().map(|s| s.score).sum::<f32>() / result.sources.len() as f32
    }

    fn mark_conflicts(result: &mut SearchResult, conflicts: &[Conflict]) {
        result.has_conflicts = true;
        result.conflict_count = conflicts.len();
        result.conflict_resolution = Some(ResolutionStrategy::SourceReliability);
        for source in &mut result.sources {
            source.may_conflict = true;
        }
    }

    fn merge_search_results(attempts: &[SearchAttempt]) -> SearchResult {
        let mut merged = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for attempt in attempts {
            for source in &attempt.result.sources {
                if seen.insert(source.text.clone()) {
                    let mut source = source.clone();
                    source.strategy_used = Some(attempt.strategy.clone());
                    merged.push(source);
                }
            }
        }

        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(10);

        SearchResult { sources: merged, has_conflicts: false, conflict_count: 0, conflict_resolution: None, merged_from: attempts.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(source: &str, text: &str, score: f32) -> SourcePassage {
        SourcePassage { source: source.to_string(), text: text.to_string(), score, strategy_used: None, may_conflict: false }
    }

    #[test]
    fn single_attempt_passes_through() {
        let resolver = ConflictResolver::new();
        let attempt = SearchAttempt {
            strategy: "vector".to_string(),
            result: SearchResult { sources: vec![passage("a", "text", 0.9)], ..SearchResult::default() },
        };
        let (result, conflicts) = resolver.resolve_search_conflicts(vec![attempt]).unwrap();
        assert!(conflicts.is_empty());
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn merges_non_conflicting_results() {
        let resolver = ConflictResolver::new();
        let a = SearchAttempt { strategy: "vector".to_string(), result: SearchResult { sources: vec![passage("docs", "rust is fast", 0.9)], ..SearchResult::default() } };
        let b = SearchAttempt { strategy: "keyword".to_string(), result: SearchResult { sources: vec![passage("docs", "rust is fast", 0.8)], ..SearchResult::default() } };
        let (result, conflicts) = resolver.resolve_search_conflicts(vec![a, b]).unwrap();
        assert!(conflicts.is_empty());
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.merged_from, 2);
    }

    #[test]
    fn detects_and_resolves_conflict_by_reliability() {
        let resolver = ConflictResolver::new();
        let a = SearchAttempt { strategy: "vector".to_string(), result: SearchResult { sources: vec![passage("official-docs", "the server is not running", 0.7)], ..SearchResult::default() } };
        let b = SearchAttempt { strategy: "keyword".to_string(), result: SearchResult { sources: vec![passage("blog", "the server is running", 0.6)], ..SearchResult::default() } };
        let (result, conflicts) = resolver.resolve_search_conflicts(vec![a, b]).unwrap();
        assert!(!conflicts.is_empty());
        assert!(result.has_conflicts);
    }

    #[test]
    fn validates_information_consistency() {
        let (consistent, conflicts) = ConflictResolver::validate_information_consistency("the server is running", &["the server is not running"]);
        assert!(!consistent);
        assert_eq!(conflicts.len(), 1);
    }
}
