//! `ContextManager`: filters, ranks and assembles [`ContextSegment`]s into
//! one context string within a token budget, and flags poisoned or
//! conflicting content before it ever reaches assembly.

use crate::segment::{quality_weight, ContextSegment, QualityTag};
use ragcore_config::ContextConfig;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::OnceLock;

/// A previously-validated statement (an assistant turn or a trusted search
/// result) that new segments are checked against for conflicts.
#[derive(Debug, Clone)]
pub struct ValidatedClaim {
    pub id: String,
    pub content: String,
    pub confidence: f32,
}

/// What a context assembly is being built for; reserved for future
/// purpose-specific segment selection (today every purpose uses the same
/// filter/rank/assemble pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPurpose {
    Response,
    Search,
    Validation,
    General,
}

fn poison_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)as an ai language model",
            r"(?i)i don't have access to",
            r"(?i)my training data",
            r"(?i)i cannot access real-time",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("poison pattern is a valid regex"))
        .collect()
    })
}

/// Pairs of words whose presence on opposite sides of two texts marks them
/// as conflicting — crude, but matches what cheap keyword-based conflict
/// detection can actually catch without an NLI model.
const CONTRADICTION_PAIRS: &[(&str, &str)] = &[("is not", "is"), ("cannot", "can"), ("false", "true"), ("incorrect", "correct")];

#[must_use]
pub fn contents_conflict(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    CONTRADICTION_PAIRS.iter().any(|(neg, pos)| {
        (a_lower.contains(neg) && b_lower.contains(pos)) || (a_lower.contains(pos) && b_lower.contains(neg))
    })
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())[..8].to_string()
}

/// Filters, ranks and assembles context segments; tracks quarantined
/// content hashes across calls so a poisoned segment stays rejected once
/// flagged.
pub struct ContextManager {
    config: ContextConfig,
    quarantined: parking_lot::Mutex<HashSet<String>>,
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ContextManager {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self { config, quarantined: parking_lot::Mutex::new(HashSet::new()) }
    }

    /// Detect content that looks hallucinated: a known self-referential
    /// model phrase, or content that contradicts a high-confidence
    /// validated claim.
    #[must_use]
    pub fn detect_poisoning(&self, content: &str, validated: &[ValidatedClaim]) -> bool {
        if poison_patterns().iter().any(|p| p.is_match(content)) {
            tracing::warn!("detected potential poisoning pattern in context segment");
            return true;
        }
        validated.iter().any(|claim| claim.confidence > 0.8 && contents_conflict(content, &claim.content))
    }

    pub fn quarantine(&self, content: &str, reason: &str) {
        tracing::warn!(reason, "quarantining content");
        self.quarantined.lock().insert(content_hash(content));
    }

    fn is_quarantined(&self, content: &str) -> bool {
        self.quarantined.lock().contains(&content_hash(content))
    }

    /// Validate one segment for quality and conflicts, returning whether it
    /// should be kept along with its (possibly adjusted) quality score.
    #[must_use]
    pub fn validate_segment(&self, segment: &mut ContextSegment, validated: &[ValidatedClaim]) -> (bool, f32) {
        if self.is_quarantined(&segment.content) || self.detect_poisoning(&segment.content, validated) {
            segment.quality = QualityTag::Poisoned;
            return (false, 0.0);
        }

        let conflicts = validated.iter().any(|claim| contents_conflict(&segment.content, &claim.content));
        if conflicts {
            segment.quality = QualityTag::Conflicted;
            return (false, 0.3);
        }

        let score = (segment.relevance * segment.source_weight()).min(1.0);
        (score >= self.config.min_quality, score)
    }

    /// Drop segments below the relevance floor or previously quarantined,
    /// deduplicate by content hash, then validate the survivors.
    #[must_use]
    pub fn filter_segments(&self, segments: Vec<ContextSegment>, validated: &[ValidatedClaim]) -> Vec<ContextSegment> {
        let mut seen = HashSet::new();
        let mut filtered = Vec::new();
        for mut segment in segments {
            if segment.relevance < self.config.min_relevance {
                continue;
            }
            if !seen.insert(content_hash(&segment.content)) {
                continue;
            }
            let (passes, score) = self.validate_segment(&mut segment, validated);
            if passes {
                segment.relevance = score;
                filtered.push(segment);
            }
        }
        filtered
    }

    /// Compute each segment's composite score (`relevance * 0.7 + quality
    /// weight * 0.3`) and sort descending.
    pub fn rank_segments(&self, mut segments: Vec<ContextSegment>) -> Vec<ContextSegment> {
        for segment in &mut segments {
            segment.composite_score = segment.relevance * 0.7 + quality_weight(segment.quality) * 0.3;
        }
        segments.sort_by(|a, b| b.composite_score.partial_cmp(&a.composite_score).unwrap_or(std::cmp::Ordering::Equal));
        segments
    }

    /// Join ranked segments into one context string, stopping once the
    /// token budget would be exceeded, and derive the overall quality from
    /// the included segments' tags.
    #[must_use]
    pub fn assemble(&self, segments: &[ContextSegment]) -> (String, QualityTag) {
        let mut parts = Vec::new();
        let mut tokens = 0usize;
        let mut qualities = Vec::new();
        for segment in segments {
            if tokens + segment.tokens_estimate > self.config.token_budget {
                break;
            }
            parts.push(segment.content.as_str());
            tokens += segment.tokens_estimate;
            qualities.push(segment.quality);
        }

        let overall = if qualities.is_empty() {
            QualityTag::Low
        } else if qualities.contains(&QualityTag::Poisoned) {
            QualityTag::Poisoned
        } else if qualities.contains(&QualityTag::Conflicted) {
            QualityTag::Conflicted
        } else if qualities.iter().all(|q| *q == QualityTag::High) {
            QualityTag::High
        } else {
            QualityTag::Medium
        };

        (parts.join("\n\n"), overall)
    }

    /// Run the full filter -> rank -> assemble pipeline.
    #[must_use]
    pub fn build_dynamic_context(&self, segments: Vec<ContextSegment>, validated: &[ValidatedClaim], _purpose: ContextPurpose) -> (String, QualityTag, Vec<ContextSegment>) {
        let filtered = self.filter_segments(segments, validated);
        let mut ranked = self.rank_segments(filtered);
        let (context, quality) = self.assemble(&ranked);
        ranked.truncate(10);
        (context, quality, ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentSource;

    fn manager() -> ContextManager {
        ContextManager::new(ContextConfig::default())
    }

    #[test]
    fn filters_out_low_relevance_segments() {
        let manager = manager();
        let segments = vec![ContextSegment::new("irrelevant", SegmentSource::Search, 0.05)];
        let filtered = manager.filter_segments(segments, &[]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn poisoned_content_is_excluded() {
        let manager = manager();
        let segments = vec![ContextSegment::new("As an AI language model, I cannot help.", SegmentSource::Search, 0.9)];
        let filtered = manager.filter_segments(segments, &[]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn conflicting_content_downgrades_relevance() {
        let manager = manager();
        let validated = vec![ValidatedClaim { id: "1".into(), content: "the sky is blue".into(), confidence: 0.95 }];
        let segments = vec![ContextSegment::new("the sky is not blue", SegmentSource::Search, 0.9)];
        let filtered = manager.filter_segments(segments, &validated);
        assert!(filtered.is_empty());
    }

    #[test]
    fn assemble_stops_at_token_budget() {
        let config = ContextConfig { token_budget: 5, ..ContextConfig::default() };
        let manager = ContextManager::new(config);
        let segments = vec![
            ContextSegment::new("aaaaaaaaaa", SegmentSource::System, 0.9).with_quality(QualityTag::High),
            ContextSegment::new("bbbbbbbbbb", SegmentSource::System, 0.9).with_quality(QualityTag::High),
        ];
        let (context, _) = manager.assemble(&segments);
        assert_eq!(context, "aaaaaaaaaa");
    }
}
