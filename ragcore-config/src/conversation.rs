//! Conversational query orchestrator configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Turns retained in memory before the pruning policy trims the oldest.
    pub max_turns_in_memory: usize,
    /// Consecutive turn-level errors tolerated before the thread ends.
    pub max_consecutive_errors: u32,
    /// Overall turn budget before a thread is force-ended.
    pub max_turns_total: u32,
    pub context: ContextConfig,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns_in_memory: 20,
            max_consecutive_errors: 3,
            max_turns_total: 200,
            context: ContextConfig::default(),
        }
    }
}

impl ConversationConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_turns_in_memory == 0 {
            return Err("conversation.max_turns_in_memory must be non-zero".into());
        }
        if self.max_consecutive_errors == 0 {
            return Err("conversation.max_consecutive_errors must be non-zero".into());
        }
        self.context.validate()
    }
}

/// Context assembly configuration used by the `ContextManager`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum tokens assembled into a single context window.
    pub token_budget: usize,
    /// Minimum relevance score for a segment to be included.
    pub min_relevance: f32,
    /// Minimum combined quality score required to avoid the `low` tag.
    pub min_quality: f32,
    /// Minimum validator confidence required before a response is returned
    /// to the user instead of a clarifying follow-up.
    pub response_confidence_threshold: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 4000,
            min_relevance: 0.3,
            min_quality: 0.4,
            response_confidence_threshold: 0.6,
        }
    }
}

impl ContextConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_budget == 0 {
            return Err("context.token_budget must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err("context.min_relevance must be in [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err("context.min_quality must be in [0, 1]".into());
        }
        Ok(())
    }
}
