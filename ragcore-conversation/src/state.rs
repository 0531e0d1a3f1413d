//! Per-thread conversation state: message history, topic tracking, search
//! attempts, and the quality-aware memory-management policy that keeps a
//! long-running thread bounded.

use chrono::{DateTime, Utc};
use ragcore_context::QualityTag;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a long-running conversation is pruned to stay bounded.
pub const MAX_CONVERSATION_HISTORY: usize = 20;
pub const MAX_RELEVANT_HISTORY: usize = 6;
pub const MAX_TOPICS_DISCUSSED: usize = 10;
pub const MAX_ERROR_MESSAGES: usize = 5;
pub const MAX_SEARCH_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Assistant,
    System,
    Tool,
    Error,
}

/// The phase a conversation thread is currently in; drives routing in
/// [`crate::graph::ConversationGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Greeting,
    Understanding,
    Searching,
    Responding,
    Clarifying,
    Validating,
    Ending,
}

/// One turn in a conversation, carrying its own validation and quality
/// state independently of the messages around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    pub validated: bool,
    pub quality_score: f32,
    #[serde(default)]
    pub conflicts_with: Vec<String>,
}

impl Message {
    #[must_use]
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type,
            content: content.into(),
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
            confidence: 1.0,
            validated: false,
            quality_score: 1.0,
            conflicts_with: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f32, validated: bool) -> Self {
        self.confidence = confidence;
        self.validated = validated;
        self.quality_score = confidence;
        self
    }
}

/// A record of one attempted retry or downstream operation that failed
/// during a given turn, retained briefly for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOperation {
    pub turn: u32,
    pub operation: String,
    pub error: String,
}

/// Per-thread conversational state, equivalent to a LangGraph-style
/// `TypedDict` state object but owned plainly instead of threaded through a
/// graph runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,

    pub current_phase: ConversationPhase,
    pub user_intent: Option<String>,
    pub confidence_score: f32,

    pub original_query: String,
    pub processed_query: String,
    pub query_keywords: Vec<String>,
    pub is_contextual: bool,

    pub current_topic: Option<String>,
    pub topics_discussed: Vec<String>,

    pub context_quality: QualityTag,
    pub context_conflicts: usize,
    pub poisoned_content: std::collections::HashSet<String>,

    pub generated_response: String,
    pub response_confidence: f32,
    pub response_validated: bool,
    pub validation_errors: Vec<String>,

    pub turn_count: u32,
    pub last_activity: DateTime<Utc>,

    pub has_errors: bool,
    pub error_messages: Vec<String>,
    pub retry_count: u32,
    pub failed_operations: Vec<FailedOperation>,

    pub requires_clarification: bool,
}

impl ConversationState {
    #[must_use]
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            messages: Vec::new(),
            current_phase: ConversationPhase::Greeting,
            user_intent: None,
            confidence_score: 0.0,
            original_query: String::new(),
            processed_query: String::new(),
            query_keywords: Vec::new(),
            is_contextual: false,
            current_topic: None,
            topics_discussed: Vec::new(),
            context_quality: QualityTag::High,
            context_conflicts: 0,
            poisoned_content: std::collections::HashSet::new(),
            generated_response: String::new(),
            response_confidence: 0.0,
            response_validated: false,
            validation_errors: Vec::new(),
            turn_count: 0,
            last_activity: Utc::now(),
            has_errors: false,
            error_messages: Vec::new(),
            retry_count: 0,
            failed_operations: Vec::new(),
            requires_clarification: false,
        }
    }

    /// Append a message, bump the turn counter, and apply the
    /// quality-aware memory management policy.
    pub fn add_message(&mut self, message_type: MessageType, content: impl Into<String>, confidence: f32, validated: bool) {
        let message = Message::new(message_type, content).with_confidence(confidence, validated);
        self.messages.push(message);
        self.turn_count += 1;
        self.last_activity = Utc::now();
        self.apply_memory_management();
    }

    /// Prefer high-quality messages when trimming history, then restore
    /// chronological order; cap the other unbounded lists too.
    fn apply_memory_management(&mut self) {
        if self.messages.len() > MAX_CONVERSATION_HISTORY {
            let mut by_quality = self.messages.clone();
            by_quality.sort_by(|a, b| {
                b.quality_score.partial_cmp(&a.quality_score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.timestamp.cmp(&a.timestamp))
            });
            by_quality.truncate(MAX_CONVERSATION_HISTORY);
            by_quality.sort_by_key(|m| m.timestamp);
            self.messages = by_quality;
        }

        if self.topics_discussed.len() > MAX_TOPICS_DISCUSSED {
            let start = self.topics_discussed.len() - MAX_TOPICS_DISCUSSED;
            self.topics_discussed.drain(..start);
        }

        if self.error_messages.len() > MAX_ERROR_MESSAGES {
            let start = self.error_messages.len() - MAX_ERROR_MESSAGES;
            self.error_messages.drain(..start);
        }

        let current_turn = self.turn_count;
        self.failed_operations.retain(|op| current_turn.saturating_sub(op.turn) < 5);

        if self.poisoned_content.len() > 10 {
            let mut remaining: Vec<String> = self.poisoned_content.iter().cloned().collect();
            remaining.truncate(10);
            self.poisoned_content = remaining.into_iter().collect();
        }
    }

    /// Most recent messages that are neither errors, low-quality, nor
    /// quarantined, optionally re-ranked by keyword overlap with `query`.
    #[must_use]
    pub fn relevant_history(&self, query: Option<&str>, max_messages: usize) -> Vec<&Message> {
        let relevant: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.message_type != MessageType::Error && m.quality_score > 0.5 && !self.poisoned_content.contains(&m.id))
            .collect();

        if let (Some(_), false) = (query, self.query_keywords.is_empty()) {
            let keywords: std::collections::HashSet<&str> = self.query_keywords.iter().map(String::as_str).collect();
            let mut scored: Vec<(usize, &Message)> = relevant
                .iter()
                .rev()
                .take(max_messages * 2)
                .map(|m| {
                    let msg_words: std::collections::HashSet<&str> = m.content.split_whitespace().collect();
                    let overlap = keywords.iter().filter(|k| msg_words.contains(*k)).count();
                    (overlap, *m)
                })
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0));
            return scored.into_iter().take(max_messages).map(|(_, m)| m).collect();
        }

        let skip = relevant.len().saturating_sub(max_messages);
        relevant.into_iter().skip(skip).collect()
    }

    /// Recompute [`Self::context_quality`] from recent message quality,
    /// conflict count, and poisoned-content presence.
    pub fn recalculate_context_quality(&mut self) {
        self.context_quality = if self.messages.is_empty() {
            QualityTag::High
        } else if !self.poisoned_content.is_empty() {
            QualityTag::Poisoned
        } else if self.context_conflicts > 2 {
            QualityTag::Conflicted
        } else {
            let recent: Vec<&Message> = self.messages.iter().rev().take(10).collect();
            let avg_quality = recent.iter().map(|m| m.quality_score).sum::<f32>() / recent.len() as f32;
            let error_rate = self.error_messages.len() as f32 / self.turn_count.max(1) as f32;
            let score = avg_quality * (1.0 - error_rate);
            if score > 0.8 {
                QualityTag::High
            } else if score > 0.5 {
                QualityTag::Medium
            } else {
                QualityTag::Low
            }
        };
    }

    #[must_use]
    pub fn should_end(&self) -> bool {
        let recent_goodbye = self
            .messages
            .iter()
            .rev()
            .take(2)
            .any(|m| m.message_type == MessageType::User && (m.content.to_lowercase().contains("goodbye") || m.content.to_lowercase().contains("bye")));
        self.turn_count > 50 || recent_goodbye || self.current_phase == ConversationPhase::Ending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_history_past_the_cap() {
        let mut state = ConversationState::new(None);
        for i in 0..MAX_CONVERSATION_HISTORY + 5 {
            state.add_message(MessageType::User, format!("message {i}"), 1.0, true);
        }
        assert_eq!(state.messages.len(), MAX_CONVERSATION_HISTORY);
        assert!(state.messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn detects_goodbye_as_end_of_conversation() {
        let mut state = ConversationState::new(None);
        state.add_message(MessageType::User, "goodbye for now", 1.0, true);
        assert!(state.should_end());
    }

    #[test]
    fn quality_recalculation_flags_poisoned_content() {
        let mut state = ConversationState::new(None);
        state.add_message(MessageType::Assistant, "some content", 0.9, true);
        state.poisoned_content.insert("bad-id".to_string());
        state.recalculate_context_quality();
        assert_eq!(state.context_quality, QualityTag::Poisoned);
    }
}
