//! External-collaborator traits the core depends on but does not implement
//! concretely (beyond the minimal defaults needed to exercise the
//! workspace end-to-end).

mod checkpoint_store;
mod chunker;
mod embedder;
mod file_processor;
mod llm_client;

pub use checkpoint_store::CheckpointStore;
pub use chunker::{ChunkedText, Chunker};
pub use embedder::Embedder;
pub use file_processor::{FileProcessor, FileProcessorRegistry, ProcessedFile};
pub use llm_client::{GenerateOptions, LLMClient};
