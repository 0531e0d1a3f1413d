//! Conversational query orchestrator: per-thread state, the phase/routing
//! state machine, query enhancement and multi-strategy retrieval, and the
//! orchestrator that ties them together with context assembly and
//! response validation.

pub mod checkpoint;
pub mod graph;
pub mod orchestrator;
pub mod query;
pub mod state;

pub use checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
pub use graph::{ConversationGraph, RouteDecision};
pub use orchestrator::{ConversationOrchestrator, TurnResponse};
pub use query::{QueryEnhancer, QueryEngine, QueryIntent, QueryOutcome, QueryType, RetrievalStrategy};
pub use state::{ConversationPhase, ConversationState, FailedOperation, Message, MessageType};
