//! `ConversationOrchestrator`: the conversational query orchestrator's
//! entry point. Ties together intent detection, the query engine, context
//! assembly, response generation and validation, and checkpointed state
//! persistence into one `process_message` call per turn.

use crate::graph::{ConversationGraph, RouteDecision};
use crate::query::{QueryEnhancer, QueryEngine};
use crate::state::{ConversationPhase, ConversationState, MessageType};
use ragcore_context::{
    ContextManager, ContextPurpose, ContextSegment, PriorResponse, ResponseSource, ResponseValidator, SegmentSource, ValidatedClaim,
};
use ragcore_config::ConversationConfig;
use ragcore_core::error::CoreError;
use ragcore_core::traits::{CheckpointStore, GenerateOptions, LLMClient};
use regex::Regex;
use std::sync::{Arc, OnceLock};

const GREETING: &str = "Hello! I'm your AI assistant. I can help you find information, answer questions, and have a conversation about various topics. What would you like to know?";
const FAREWELL: &str = "Goodbye! Let me know if you need anything else.";
const HELP: &str = "Ask me a question and I'll search the knowledge base and conversation history to answer it.";
const CLARIFICATION_PROMPT: &str = "Could you clarify what you're asking about?";
const FALLBACK_ERROR: &str = "I apologize, but I encountered an error. Please try again.";

fn intent_patterns() -> &'static [(&'static str, Vec<Regex>)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |patterns: &[&str]| patterns.iter().map(|p| Regex::new(p).expect("intent pattern is valid regex")).collect();
        vec![
            ("greeting", compile(&[r"(?i)\b(hello|hi|hey|good morning|good afternoon)\b"])),
            ("question", compile(&[r"(?i)\b(what|how|when|where|why|who)\b", r"\?"])),
            ("search", compile(&[r"(?i)\b(find|search|look for|show me)\b"])),
            ("comparison", compile(&[r"(?i)\b(compare|versus|vs|difference|better)\b"])),
            ("explanation", compile(&[r"(?i)\b(explain|tell me about|describe)\b"])),
            ("help", compile(&[r"(?i)\b(help|assist|support)\b"])),
            ("goodbye", compile(&[r"(?i)\b(bye|goodbye|see you|farewell)\b"])),
            ("clarification", compile(&[r"(?i)\b(what was|repeat|again|previous)\b"])),
            ("follow_up", compile(&[r"(?i)\b(more|also|additionally|furthermore|tell me more)\b"])),
        ]
    })
}

/// Anaphoric lead-ins that imply the user is referring back to something
/// already discussed ("tell me more", "for floor 3", "those incidents").
const ANAPHORIC_PREFIXES: &[&str] = &["tell me more", "for floor", "those", "these", "what about", "and the"];

/// A short message with prior turns, or one opening with an anaphoric
/// reference, is answered in light of recent topics rather than taken at
/// face value.
fn is_contextual_query(state: &ConversationState, user_input: &str) -> bool {
    let trimmed = user_input.trim();
    let has_history = state.messages.len() > 1;
    let short_follow_up = has_history && trimmed.split_whitespace().count() <= 4;
    let anaphoric = ANAPHORIC_PREFIXES.iter().any(|prefix| trimmed.to_lowercase().starts_with(prefix));
    short_follow_up || anaphoric
}

/// Outcome of processing a single user message.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub thread_id: String,
    pub response: String,
    pub confidence: f32,
    pub turn_count: u32,
    pub error: Option<String>,
}

/// Orchestrates a conversation thread end to end: intent understanding,
/// knowledge search, context assembly, response generation/validation, and
/// checkpointed persistence.
pub struct ConversationOrchestrator {
    graph: ConversationGraph,
    enhancer: QueryEnhancer,
    config: ConversationConfig,
    query_engine: Arc<QueryEngine>,
    context_manager: Arc<ContextManager>,
    validator: ResponseValidator,
    llm_client: Option<Arc<dyn LLMClient>>,
    checkpoints: Arc<dyn CheckpointStore<ConversationState>>,
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator").field("has_llm_client", &self.llm_client.is_some()).finish_non_exhaustive()
    }
}

impl ConversationOrchestrator {
    #[must_use]
    pub fn new(
        config: ConversationConfig,
        query_engine: Arc<QueryEngine>,
        context_manager: Arc<ContextManager>,
        llm_client: Option<Arc<dyn LLMClient>>,
        checkpoints: Arc<dyn CheckpointStore<ConversationState>>,
    ) -> Self {
        Self {
            graph: ConversationGraph::new(),
            enhancer: QueryEnhancer::new(),
            config,
            query_engine,
            context_manager,
            validator: ResponseValidator::default(),
            llm_client,
            checkpoints,
        }
    }

    /// Process one user message for `thread_id`, loading or creating its
    /// state, advancing it through the conversation graph, and persisting
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] if the checkpoint store fails;
    /// downstream search/LLM errors are captured in the returned
    /// [`TurnResponse::error`] rather than propagated, so a single failing
    /// turn doesn't abort the thread.
    pub async fn process_message(&self, thread_id: &str, message: &str) -> Result<TurnResponse, CoreError> {
        let mut state = self.checkpoints.get(thread_id).await?.unwrap_or_else(|| ConversationState::new(Some(thread_id.to_string())));

        let result = self.run_turn(&mut state, message).await;
        self.checkpoints.put(thread_id, &state).await?;

        match result {
            Ok(response) => Ok(TurnResponse { thread_id: thread_id.to_string(), response, confidence: state.response_confidence, turn_count: state.turn_count, error: None }),
            Err(err) => Ok(TurnResponse { thread_id: thread_id.to_string(), response: FALLBACK_ERROR.to_string(), confidence: 0.0, turn_count: state.turn_count, error: Some(err.to_string()) }),
        }
    }

    async fn run_turn(&self, state: &mut ConversationState, message: &str) -> Result<String, CoreError> {
        if state.turn_count == 0 && message.trim().is_empty() {
            state.add_message(MessageType::Assistant, GREETING, 1.0, true);
            self.graph.transition(state, ConversationPhase::Understanding);
            return Ok(GREETING.to_string());
        }

        if !message.trim().is_empty() {
            state.add_message(MessageType::User, message, 1.0, true);
        }
        self.understand_intent(state, message);

        let response = match ConversationGraph::route_after_understanding(state) {
            RouteDecision::End => {
                self.graph.transition(state, ConversationPhase::Ending);
                FAREWELL.to_string()
            }
            RouteDecision::Respond if state.user_intent.as_deref() == Some("help") => {
                self.graph.transition(state, ConversationPhase::Responding);
                HELP.to_string()
            }
            RouteDecision::Respond => {
                self.graph.transition(state, ConversationPhase::Responding);
                GREETING.to_string()
            }
            RouteDecision::Search | RouteDecision::Continue | RouteDecision::Clarify => {
                let response = self.search_and_respond(state).await?;
                if state.current_phase == ConversationPhase::Searching {
                    self.graph.transition(state, ConversationPhase::Responding);
                }
                response
            }
        };

        state.add_message(MessageType::Assistant, &response, state.response_confidence.max(0.5), state.response_validated);

        if ConversationGraph::route_conversation_end(state, &self.config) == RouteDecision::End {
            self.graph.transition(state, ConversationPhase::Ending);
        }

        Ok(response)
    }

    fn understand_intent(&self, state: &mut ConversationState, user_input: &str) {
        if user_input.trim().is_empty() {
            return;
        }
        state.original_query = user_input.to_string();
        state.processed_query = user_input.to_string();

        state.is_contextual = is_contextual_query(state, user_input);
        if state.is_contextual {
            let topics: Vec<String> = state.topics_discussed.iter().rev().take(3).cloned().collect();
            if !topics.is_empty() {
                state.processed_query = format!("{user_input} {}", topics.join(" "));
            }
        }

        let detected: Vec<&str> =
            intent_patterns().iter().filter(|(_, patterns)| patterns.iter().any(|p| p.is_match(user_input))).map(|(name, _)| *name).collect();

        state.user_intent = Some(if detected.contains(&"goodbye") {
            state.current_phase = ConversationPhase::Ending;
            "goodbye".to_string()
        } else if detected.contains(&"greeting") && state.turn_count <= 2 {
            state.current_phase = ConversationPhase::Greeting;
            "greeting".to_string()
        } else if detected.contains(&"clarification") {
            state.current_phase = ConversationPhase::Searching;
            "clarification".to_string()
        } else if detected.contains(&"help") {
            state.current_phase = ConversationPhase::Responding;
            "help".to_string()
        } else {
            state.current_phase = ConversationPhase::Searching;
            "information_seeking".to_string()
        });

        let keywords = self.enhancer.extract_keywords(user_input);
        state.confidence_score = if detected.is_empty() { 0.5 } else { 0.8 };
        if !keywords.is_empty() {
            state.topics_discussed.extend(keywords.iter().take(3).cloned());
            let overflow = state.topics_discussed.len().saturating_sub(crate::state::MAX_TOPICS_DISCUSSED);
            state.topics_discussed.drain(..overflow);
        }
        state.query_keywords = keywords;
    }

    async fn search_and_respond(&self, state: &mut ConversationState) -> Result<String, CoreError> {
        let outcome = self.query_engine.search_cascade(&state.processed_query, &state.original_query, &state.topics_discussed, 8, None).await?;

        if outcome.results.is_empty() {
            state.requires_clarification = true;
            if ConversationGraph::route_after_search(state) == RouteDecision::Clarify {
                return Ok(CLARIFICATION_PROMPT.to_string());
            }
        }

        let segments: Vec<ContextSegment> = outcome
            .results
            .iter()
            .map(|r| {
                let text = r.metadata.as_ref().and_then(|m| m.get("text")).and_then(|v| v.as_str()).unwrap_or_default();
                ContextSegment::new(text, SegmentSource::Search, r.score)
            })
            .collect();

        let recent_validated: Vec<ValidatedClaim> = state
            .messages
            .iter()
            .rev()
            .filter(|m| m.message_type == MessageType::Assistant && m.validated)
            .take(5)
            .map(|m| ValidatedClaim { id: m.id.clone(), content: m.content.clone(), confidence: m.confidence })
            .collect();

        let (context, quality, _ranked) = self.context_manager.build_dynamic_context(segments, &recent_validated, ContextPurpose::Response);
        state.context_quality = quality;

        let response = self.generate_response(state, &context).await?;

        let sources: Vec<ResponseSource> = outcome.results.iter().filter_map(|r| r.metadata.as_ref().and_then(|m| m.get("text")).and_then(|v| v.as_str())).map(|t| ResponseSource { text: t.to_string() }).collect();
        let priors: Vec<PriorResponse> = recent_validated.iter().map(|c| PriorResponse { id: c.id.clone(), content: c.content.clone() }).collect();
        let report = self.validator.validate_response(&response, &state.original_query, &state.query_keywords, &sources, &priors);

        state.response_confidence = report.confidence;
        state.response_validated = report.passed;
        state.validation_errors = report.errors;

        Ok(response)
    }

    async fn generate_response(&self, state: &ConversationState, context: &str) -> Result<String, CoreError> {
        if let Some(client) = &self.llm_client {
            if !context.is_empty() {
                let prompt = format!("Context:\n{context}\n\nQuestion: {}\n\nAnswer using only the context above.", state.original_query);
                return client.generate(&prompt, GenerateOptions::default()).await;
            }
        }

        if context.is_empty() {
            Ok(format!("I couldn't find relevant information about \"{}\".", state.original_query))
        } else {
            Ok(context.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MessageType;

    #[test]
    fn first_turn_is_never_contextual_regardless_of_length() {
        let mut state = ConversationState::new(None);
        state.add_message(MessageType::User, "those", 1.0, true);
        assert!(!is_contextual_query(&state, "those"));
    }

    #[test]
    fn short_follow_up_after_prior_turns_is_contextual() {
        let mut state = ConversationState::new(None);
        state.add_message(MessageType::User, "what is the incident process", 1.0, true);
        state.add_message(MessageType::Assistant, "it covers detection and response", 1.0, true);
        state.add_message(MessageType::User, "for floor 3", 1.0, true);
        assert!(is_contextual_query(&state, "for floor 3"));
    }

    #[test]
    fn anaphoric_prefix_is_contextual_even_on_first_turn() {
        let state = ConversationState::new(None);
        assert!(is_contextual_query(&state, "tell me more about that incident"));
    }

    #[test]
    fn contextual_query_gets_recent_topics_appended() {
        let orchestrator = ConversationOrchestrator::new(
            ConversationConfig::default(),
            Arc::new(QueryEngine::new(Arc::new(NoopEmbedder), Arc::new(NoopStorage))),
            Arc::new(ContextManager::new(ragcore_config::ContextConfig::default())),
            None,
            Arc::new(crate::checkpoint::InMemoryCheckpointStore::new()),
        );
        let mut state = ConversationState::new(None);
        state.topics_discussed = vec!["floor 3".to_string(), "elevator".to_string()];
        state.add_message(MessageType::User, "what happened there", 1.0, true);
        orchestrator.understand_intent(&mut state, "what happened there");
        assert!(state.is_contextual);
        assert!(state.processed_query.contains("elevator"));
    }

    struct NoopEmbedder;

    #[async_trait::async_trait]
    impl ragcore_core::traits::Embedder for NoopEmbedder {
        fn model_name(&self) -> &str {
            "noop"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(vec![0.0; 4])
        }
    }

    struct NoopStorage;

    #[async_trait::async_trait]
    impl ragcore_vector::VectorStorage for NoopStorage {
        async fn insert(&self, _items: Vec<(Vec<f32>, ragcore_metadata::MetadataRecord)>) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }

        async fn search(&self, _query: &ragcore_vector::VectorQuery) -> Result<Vec<ragcore_vector::VectorResult>, CoreError> {
            Ok(vec![])
        }

        async fn delete(&self, _ids: &[String]) -> Result<(), CoreError> {
            Ok(())
        }

        async fn stats(&self) -> Result<ragcore_vector::StorageStats, CoreError> {
            Err(CoreError::NotFound { message: "stats not implemented for noop storage".to_string() })
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

        async fn find_by_path_identity(
            &self,
            _doc_path: Option<&str>,
            _filename: Option<&str>,
            _file_path: Option<&str>,
        ) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }

        async fn clear(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }
}
