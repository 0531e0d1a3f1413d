//! Context segments: one candidate span of text competing for a slot in the
//! assembled context window, plus the quality tag it carries.

pub use ragcore_core::types::QualityTag;
use serde::{Deserialize, Serialize};

/// Where a [`ContextSegment`]'s content originated, used to weight its
/// reliability during quality scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    Search,
    Conversation,
    System,
}

impl SegmentSource {
    /// Reliability weight applied during [`crate::assembler::ContextManager`]
    /// quality scoring.
    const fn reliability_weight(self) -> f32 {
        match self {
            Self::Search => 0.9,
            Self::Conversation => 0.8,
            Self::System => 1.0,
        }
    }
}

/// One candidate span of text for inclusion in an assembled context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSegment {
    pub content: String,
    pub source: SegmentSource,
    /// Raw relevance score, `0.0..=1.0`, before quality adjustments.
    pub relevance: f32,
    pub quality: QualityTag,
    /// Rough token count (`content.len() / 4`), used for budget enforcement.
    pub tokens_estimate: usize,
    /// Filled in by [`crate::assembler::ContextManager::rank_segments`].
    pub composite_score: f32,
}

impl ContextSegment {
    #[must_use]
    pub fn new(content: impl Into<String>, source: SegmentSource, relevance: f32) -> Self {
        let content = content.into();
        let tokens_estimate = content.len() / 4;
        Self { content, source, relevance, quality: QualityTag::Medium, tokens_estimate, composite_score: 0.0 }
    }

    #[must_use]
    pub const fn with_quality(mut self, quality: QualityTag) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub(crate) const fn source_weight(&self) -> f32 {
        self.source.reliability_weight()
    }
}

#[must_use]
pub(crate) const fn quality_weight(quality: QualityTag) -> f32 {
    match quality {
        QualityTag::High => 1.0,
        QualityTag::Medium => 0.7,
        QualityTag::Low => 0.4,
        QualityTag::Conflicted => 0.2,
        QualityTag::Poisoned => 0.0,
    }
}
