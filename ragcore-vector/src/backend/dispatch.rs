//! Enum wrapper so `VectorIndex` can hold one of the four backends without
//! boxing a trait object (keeps `search`'s hot path monomorphic).

use super::{AnnBackend, Candidate, FlatBackend, GraphBackend, IvfBackend, PqBackend};
use crate::error::VectorError;
use ragcore_config::VectorIndexConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Flat,
    Ivf,
    Graph,
    IvfPq,
}

impl BackendKind {
    /// Select a backend kind from the live population, matching the
    /// thresholds the index was configured with.
    #[must_use]
    pub fn for_population(population: usize, config: &VectorIndexConfig) -> Self {
        if population < config.flat_threshold {
            Self::Flat
        } else if population < config.ivf_threshold {
            Self::Ivf
        } else if population < config.hnsw_threshold {
            Self::Graph
        } else {
            Self::IvfPq
        }
    }
}

pub enum Backend {
    Flat(FlatBackend),
    Ivf(IvfBackend),
    Graph(GraphBackend),
    IvfPq(PqBackend),
}

impl Backend {
    #[must_use]
    pub fn build(kind: BackendKind, dim: usize, training: &[Vec<f32>], population_estimate: usize, config: &VectorIndexConfig) -> Self {
        match kind {
            BackendKind::Flat => Self::Flat(FlatBackend::new()),
            BackendKind::Ivf => Self::Ivf(IvfBackend::train(training, dim, population_estimate, &config.ivf)),
            BackendKind::Graph => Self::Graph(GraphBackend::new(dim, &config.hnsw)),
            BackendKind::IvfPq => Self::IvfPq(PqBackend::train(training, dim, &config.ivf, &config.pq)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Flat(_) => BackendKind::Flat,
            Self::Ivf(_) => BackendKind::Ivf,
            Self::Graph(_) => BackendKind::Graph,
            Self::IvfPq(_) => BackendKind::IvfPq,
        }
    }
}

impl AnnBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Self::Flat(b) => b.name(),
            Self::Ivf(b) => b.name(),
            Self::Graph(b) => b.name(),
            Self::IvfPq(b) => b.name(),
        }
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        match self {
            Self::Flat(b) => b.add(vector),
            Self::Ivf(b) => b.add(vector),
            Self::Graph(b) => b.add(vector),
            Self::IvfPq(b) => b.add(vector),
        }
    }

    fn remove(&mut self, position: usize) {
        match self {
            Self::Flat(b) => b.remove(position),
            Self::Ivf(b) => b.remove(position),
            Self::Graph(b) => b.remove(position),
            Self::IvfPq(b) => b.remove(position),
        }
    }

    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate> {
        match self {
            Self::Flat(b) => b.search(query, k, is_deleted),
            Self::Ivf(b) => b.search(query, k, is_deleted),
            Self::Graph(b) => b.search(query, k, is_deleted),
            Self::IvfPq(b) => b.search(query, k, is_deleted),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Flat(b) => b.len(),
            Self::Ivf(b) => b.len(),
            Self::Graph(b) => b.len(),
            Self::IvfPq(b) => b.len(),
        }
    }

    fn get_vector(&self, position: usize) -> Option<Vec<f32>> {
        match self {
            Self::Flat(b) => b.get_vector(position),
            Self::Ivf(b) => b.get_vector(position),
            Self::Graph(b) => b.get_vector(position),
            Self::IvfPq(b) => b.get_vector(position),
        }
    }
}
