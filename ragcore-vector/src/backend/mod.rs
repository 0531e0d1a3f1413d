//! The four ANN backends `VectorIndex` auto-selects between, hidden
//! behind one internal trait so the rest of the crate never branches on
//! which backend is active.

mod dispatch;
mod flat;
mod graph;
mod ivf;
mod kmeans;
mod pq;

pub use dispatch::{Backend, BackendKind};
pub use flat::FlatBackend;
pub use graph::GraphBackend;
pub use ivf::IvfBackend;
pub use pq::PqBackend;

use crate::error::VectorError;

/// One candidate from [`AnnBackend::search`]: an internal position and its
/// similarity score (higher is better; callers have already normalized
/// vectors so this is a plain dot product / cosine similarity).
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub position: usize,
    pub score: f32,
}

/// A single ANN backend operating purely on internal `position` indices;
/// `VectorIndex` owns the `position -> vector_id` / metadata mapping and
/// the soft-deletion bitmap.
pub trait AnnBackend: Send + Sync {
    /// Human-readable backend name, used in stats and log lines.
    fn name(&self) -> &'static str;

    /// Insert one vector, returning its internal position. Positions are
    /// assigned densely and increase monotonically; soft-deleted
    /// positions are never reused (only a rebuild compacts them away).
    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError>;

    /// Mark `position` as removed from the backend's search structures.
    /// Implementations may no-op here and rely on the caller's deleted-set
    /// filter, but should at minimum stop returning the position from
    /// `search` once this has been called.
    fn remove(&mut self, position: usize);

    /// Return up to `k` nearest candidates to `query`, excluding any
    /// position for which `is_deleted` returns `true`.
    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate>;

    /// Number of live positions tracked by the backend (including ones
    /// awaiting physical compaction).
    fn len(&self) -> usize;

    /// Recover the raw (normalized) vector stored at `position`, for
    /// persistence and rebuild. `None` if the position was removed.
    fn get_vector(&self, position: usize) -> Option<Vec<f32>>;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
