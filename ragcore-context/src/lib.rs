//! Context assembly, response validation and search-conflict resolution
//! for the conversational query orchestrator.

pub mod assembler;
pub mod conflict;
pub mod segment;
pub mod validator;

pub use assembler::{ContextManager, ContextPurpose, ValidatedClaim};
pub use conflict::{Conflict, ConflictResolver, ResolutionStrategy, SearchAttempt, SearchResult, SourcePassage};
pub use segment::{ContextSegment, QualityTag, SegmentSource};
pub use validator::{PriorResponse, ResponseSource, ResponseValidator, ValidationReport};
