//! `ResponseValidator`: checks a generated response for hallucination,
//! consistency with recent validated turns, completeness and relevance to
//! the query, and factual accuracy against its cited sources.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// One retrieved source passage a response can be checked against.
#[derive(Debug, Clone)]
pub struct ResponseSource {
    pub text: String,
}

/// A previously validated assistant turn, used for the consistency check.
#[derive(Debug, Clone)]
pub struct PriorResponse {
    pub id: String,
    pub content: String,
}

/// Result of one individual validation check.
#[derive(Debug, Clone)]
struct CheckOutcome {
    passed: bool,
    confidence: f32,
    errors: Vec<String>,
}

/// Outcome of [`ResponseValidator::validate_response`].
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub passed: bool,
    pub confidence: f32,
    pub errors: Vec<String>,
}

fn hallucination_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)as of my last update",
            r"(?i)i don't have real-time",
            r"(?i)my training data",
            r"(?i)i cannot browse",
            r"(?i)i'm not sure about the specific",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("hallucination pattern is a valid regex"))
        .collect()
    })
}

fn stopwords() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| ["the", "and", "for"].into_iter().collect())
}

fn split_words(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Split on sentence boundaries and keep sentences that read as factual
/// assertions (contain a copula or possessive verb).
fn extract_claims(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let lower = s.to_lowercase();
            ["is", "are", "has", "have", "was", "were"].iter().any(|w| lower.split_whitespace().any(|tok| tok == *w))
        })
        .map(str::to_string)
        .collect()
}

fn claim_supported_by_sources(claim: &str, source_content: &str) -> bool {
    let claim_words = split_words(claim);
    if claim_words.is_empty() {
        return false;
    }
    let source_words = split_words(source_content);
    let overlap = claim_words.intersection(&source_words).count();
    (overlap as f32 / claim_words.len() as f32) > 0.6
}

fn verify_claim(claim: &str, source_content: &str) -> bool {
    let claim_lower = claim.to_lowercase();
    let source_lower = source_content.to_lowercase();
    if source_lower.contains(&claim_lower) {
        return true;
    }
    let key_elements: Vec<&str> = claim_lower.split_whitespace().filter(|w| w.len() > 3 && !stopwords().contains(w)).collect();
    if key_elements.is_empty() {
        return true;
    }
    let found = key_elements.iter().filter(|elem| source_lower.contains(*elem)).count();
    found as f32 >= key_elements.len() as f32 * 0.7
}

fn statements_contradict(s1: &str, s2: &str) -> bool {
    let s1_lower = s1.to_lowercase();
    let s2_lower = s2.to_lowercase();
    let s1_has_not = s1_lower.contains("not");
    let s2_has_not = s2_lower.contains("not");
    if s1_has_not == s2_has_not {
        return false;
    }
    let s1_words = split_words(&s1_lower);
    let s2_words = split_words(&s2_lower);
    let smaller = s1_words.len().min(s2_words.len());
    if smaller == 0 {
        return false;
    }
    let overlap = s1_words.intersection(&s2_words).count();
    (overlap as f32 / smaller as f32) > 0.5
}

fn responses_conflict(a: &str, b: &str) -> bool {
    let claims_a = extract_claims(a);
    let claims_b = extract_claims(b);
    claims_a.iter().any(|s1| claims_b.iter().any(|s2| statements_contradict(s1, s2)))
}

/// Validates LLM responses before they are committed to a conversation's
/// turn history.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    min_confidence: f32,
    max_hallucination_score: f32,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self { min_confidence: 0.6, max_hallucination_score: 0.3 }
    }
}

impl ResponseValidator {
    #[must_use]
    pub const fn new(min_confidence: f32, max_hallucination_score: f32) -> Self {
        Self { min_confidence, max_hallucination_score }
    }

    /// Run all five checks and combine them into one report. `query` and
    /// `query_keywords` may be empty when the response isn't tied to a
    /// specific user question (e.g. a proactive system message).
    #[must_use]
    pub fn validate_response(
        &self,
        response: &str,
        query: &str,
        query_keywords: &[String],
        sources: &[ResponseSource],
        recent_validated: &[PriorResponse],
    ) -> ValidationReport {
        let checks = [
            self.check_hallucination(response, sources),
            Self::check_consistency(response, recent_validated),
            Self::check_completeness(response, query, query_keywords),
            Self::check_relevance(response, query),
            Self::check_factual_accuracy(response, sources),
        ];

        let mut errors = Vec::new();
        let mut total_confidence = 0.0;
        for outcome in &checks {
            total_confidence += outcome.confidence;
            if !outcome.passed {
                errors.extend(outcome.errors.iter().cloned());
            }
        }

        let confidence = total_confidence / checks.len() as f32;
        let passed = confidence >= self.min_confidence && errors.is_empty();

        ValidationReport { passed, confidence, errors }
    }

    fn check_hallucination(&self, response: &str, sources: &[ResponseSource]) -> CheckOutcome {
        let mut errors = Vec::new();
        let mut pattern_matches = 0u32;
        for pattern in hallucination_patterns() {
            if pattern.is_match(response) {
                pattern_matches += 1;
                errors.push(format!("potential hallucination pattern: {}", pattern.as_str()));
            }
        }

        let mut unsupported_claims = 0u32;
        if !sources.is_empty() {
            let source_content = sources.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
            let claims = extract_claims(response);
            for claim in &claims {
                if !claim_supported_by_sources(claim, &source_content) {
                    unsupported_claims += 1;
                }
            }
            if !claims.is_empty() && f64::from(unsupported_claims) > claims.len() as f64 * 0.3 {
                errors.push(format!("response contains {unsupported_claims} unsupported claims"));
            }
        }

        let hallucination_score = f32::from(pattern_matches as u16).mul_add(0.2, f32::from(unsupported_claims as u16) * 0.1);
        let confidence = 1.0 - hallucination_score.min(1.0);
        let passed = hallucination_score <= self.max_hallucination_score;

        CheckOutcome { passed, confidence, errors }
    }

    fn check_consistency(response: &str, recent_validated: &[PriorResponse]) -> CheckOutcome {
        let mut errors = Vec::new();
        let mut inconsistencies = 0u32;
        for prior in recent_validated.iter().rev().take(5) {
            if responses_conflict(response, &prior.content) {
                inconsistencies += 1;
                errors.push(format!("conflicts with previous response: {}", prior.id));
            }
        }
        let confidence = 1.0 - f32::from(inconsistencies as u16) * 0.2;
        CheckOutcome { passed: inconsistencies == 0, confidence, errors }
    }

    fn check_completeness(response: &str, query: &str, query_keywords: &[String]) -> CheckOutcome {
        if query.is_empty() {
            return CheckOutcome { passed: true, confidence: 1.0, errors: vec![] };
        }

        let mut errors = Vec::new();
        if response.split_whitespace().count() < 10 && query.contains('?') {
            errors.push("response too short for the query".to_string());
            return CheckOutcome { passed: false, confidence: 0.5, errors };
        }

        let keywords: HashSet<String> = query_keywords.iter().map(|k| k.to_lowercase()).collect();
        let response_words = split_words(response);
        let coverage = if keywords.is_empty() {
            1.0
        } else {
            keywords.intersection(&response_words).count() as f32 / keywords.len() as f32
        };

        if coverage < 0.3 {
            errors.push("response doesn't address key query terms".to_string());
        }

        CheckOutcome { passed: coverage >= 0.5, confidence: coverage, errors }
    }

    fn check_relevance(response: &str, query: &str) -> CheckOutcome {
        let mut errors = Vec::new();
        let query_words = split_words(query);
        let response_words = split_words(response);

        let overlap = if query_words.is_empty() {
            1.0
        } else {
            query_words.intersection(&response_words).count() as f32 / query_words.len() as f32
        };

        if overlap < 0.2 {
            errors.push("response seems unrelated to query".to_string());
        }

        CheckOutcome { passed: overlap >= 0.3, confidence: overlap, errors }
    }

    fn check_factual_accuracy(response: &str, sources: &[ResponseSource]) -> CheckOutcome {
        if sources.is_empty() {
            return CheckOutcome { passed: true, confidence: 0.7, errors: vec![] };
        }

        let mut errors = Vec::new();
        let source_content = sources.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        let claims = extract_factual_claims(response);
        let verified = claims.iter().filter(|c| verify_claim(c, &source_content)).count();
        let accuracy = if claims.is_empty() { 1.0 } else { verified as f32 / claims.len() as f32 };

        if accuracy < 0.5 {
            errors.push(format!("only {verified}/{} claims verified", claims.len()));
        }

        CheckOutcome { passed: accuracy >= 0.6, confidence: accuracy, errors }
    }
}

fn extract_factual_claims(text: &str) -> Vec<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [r"(\w+)\s+(?:is|are)\s+(\w+)", r"(\w+)\s+(?:has|have)\s+(\w+)", r"(\d+)\s+(\w+)"]
            .iter()
            .map(|p| Regex::new(p).expect("factual claim pattern is a valid regex"))
            .collect()
    });

    let mut claims = Vec::new();
    for pattern in patterns {
        for captures in pattern.captures_iter(text) {
            let parts: Vec<&str> = captures.iter().skip(1).filter_map(|m| m.map(|m| m.as_str())).collect();
            claims.push(parts.join(" "));
        }
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_always_passes_completeness() {
        let outcome = ResponseValidator::check_completeness("short reply", "", &[]);
        assert!(outcome.passed);
    }

    #[test]
    fn flags_hallucination_pattern() {
        let validator = ResponseValidator::default();
        let outcome = validator.check_hallucination("As of my last update, things were fine.", &[]);
        assert!(!outcome.passed);
        assert!(!outcome.errors.is_empty());
    }

    #[test]
    fn validates_full_response_without_sources() {
        let validator = ResponseValidator::default();
        let report = validator.validate_response(
            "Rust is a systems programming language and it is fast.",
            "what is rust?",
            &["rust".to_string()],
            &[],
            &[],
        );
        assert!(report.confidence > 0.0);
    }

    #[test]
    fn detects_conflicting_prior_response() {
        let prior = PriorResponse { id: "turn-1".to_string(), content: "The server is not running.".to_string() };
        let outcome = ResponseValidator::check_consistency("The server is running fine.", std::slice::from_ref(&prior));
        assert!(!outcome.passed);
    }
}
