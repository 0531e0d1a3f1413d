//! Self-optimizing ANN vector index: automatic backend selection by
//! population, atomic persistence, soft/hard rebuilds on deletion, plus a
//! filterable/scrollable view for metadata-constrained access that doesn't
//! go through similarity search.

pub mod backend;
pub mod error;
pub mod filterable;
pub mod index;
pub mod storage_trait;
pub mod types;

pub use error::VectorError;
pub use filterable::{FilterableVectorStore, ScrollCursor, ScrollPage};
pub use index::{DimensionCompatibility, VectorIndex};
pub use storage_trait::VectorStorage;
pub use types::{StorageStats, VectorEntry, VectorQuery, VectorResult};
