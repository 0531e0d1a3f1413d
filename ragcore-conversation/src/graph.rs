//! Deterministic conversation flow: a phase/transition state machine that
//! replaces the original LangGraph workflow with explicit Rust routing
//! functions, since there is no graph runtime in this workspace's stack.

use crate::state::{ConversationPhase, ConversationState};
use ragcore_config::ConversationConfig;

/// What a conversation turn should do next, decided by the routing
/// functions below rather than by a graph executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Search,
    Respond,
    Clarify,
    Continue,
    End,
}

impl ConversationPhase {
    /// Whether this phase allows transitioning into `next` at all; used to
    /// reject nonsensical jumps (e.g. `Ending` back to `Greeting`).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Greeting, Self::Understanding)
                | (Self::Understanding, Self::Searching | Self::Responding | Self::Ending)
                | (Self::Searching, Self::Responding | Self::Clarifying)
                | (Self::Responding, Self::Understanding | Self::Ending | Self::Validating)
                | (Self::Validating, Self::Responding | Self::Ending)
                | (Self::Clarifying, Self::Understanding)
        )
    }
}

/// Drives a single conversation thread through its phases, mirroring the
/// node/edge structure of the original workflow graph as plain control
/// flow plus explicit routing predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationGraph;

impl ConversationGraph {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Route after intent understanding: goodbye ends the thread,
    /// greetings/help go straight to a response, everything else (and any
    /// contextual follow-up) goes to search.
    #[must_use]
    pub fn route_after_understanding(state: &ConversationState) -> RouteDecision {
        match state.user_intent.as_deref() {
            Some("goodbye") => RouteDecision::End,
            Some("greeting" | "help") => RouteDecision::Respond,
            _ if state.is_contextual => RouteDecision::Search,
            _ => RouteDecision::Search,
        }
    }

    /// Route after a knowledge search: only detour to clarification if the
    /// search itself flagged ambiguity, never merely because it came back
    /// empty (the response stage handles that case).
    #[must_use]
    pub const fn route_after_search(state: &ConversationState) -> RouteDecision {
        if state.requires_clarification {
            RouteDecision::Clarify
        } else {
            RouteDecision::Respond
        }
    }

    /// Route after generating a response: continue the thread unless it's
    /// explicitly ending, has looped too many turns, or has accumulated
    /// too many errors or retries (thresholds from `config`).
    #[must_use]
    pub fn route_conversation_end(state: &ConversationState, config: &ConversationConfig) -> RouteDecision {
        let ending = state.current_phase == ConversationPhase::Ending
            || state.user_intent.as_deref() == Some("goodbye")
            || state.turn_count > config.max_turns_total
            || state.retry_count > config.max_consecutive_errors
            || state.error_messages.len() > config.max_consecutive_errors as usize
            || state.current_phase == ConversationPhase::Responding;

        if ending {
            tracing::info!(
                phase = ?state.current_phase,
                intent = ?state.user_intent,
                turns = state.turn_count,
                "ending conversation"
            );
            RouteDecision::End
        } else {
            RouteDecision::Continue
        }
    }

    /// Apply a phase transition, rejecting (and logging) one that the
    /// phase graph doesn't allow rather than silently jumping anyway.
    pub fn transition(&self, state: &mut ConversationState, next: ConversationPhase) {
        if state.current_phase.can_transition_to(next) {
            state.current_phase = next;
        } else {
            tracing::warn!(from = ?state.current_phase, to = ?next, "rejected invalid phase transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MessageType;

    #[test]
    fn goodbye_intent_ends_the_thread() {
        let mut state = ConversationState::new(None);
        state.user_intent = Some("goodbye".to_string());
        assert_eq!(ConversationGraph::route_after_understanding(&state), RouteDecision::End);
    }

    #[test]
    fn question_intent_routes_to_search() {
        let mut state = ConversationState::new(None);
        state.user_intent = Some("question".to_string());
        assert_eq!(ConversationGraph::route_after_understanding(&state), RouteDecision::Search);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let graph = ConversationGraph::new();
        let mut state = ConversationState::new(None);
        state.current_phase = ConversationPhase::Ending;
        graph.transition(&mut state, ConversationPhase::Greeting);
        assert_eq!(state.current_phase, ConversationPhase::Ending);
    }

    #[test]
    fn too_many_retries_ends_conversation() {
        let mut state = ConversationState::new(None);
        state.retry_count = 10;
        let config = ConversationConfig::default();
        assert_eq!(ConversationGraph::route_conversation_end(&state, &config), RouteDecision::End);
    }
}
