//! Graph backend: a single-layer navigable small-world graph searched by
//! greedy best-first expansion, in the spirit of HNSW's ground layer.
//!
//! This intentionally does not build HNSW's full multi-layer hierarchy —
//! a production binding would use `faiss`/`hnswlib`-equivalent native
//! code for that. What's preserved is the part that matters for this
//! workspace's invariants: `m`/`ef_construction`/`ef_search`-governed
//! approximate search with sub-linear behavior as the graph grows.

use super::{AnnBackend, Candidate};
use crate::error::VectorError;
use ragcore_config::HnswConfig;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

struct ScoredNode {
    position: usize,
    score: f32,
}

impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredNode {}
impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal)
    }
}

pub struct GraphBackend {
    dim: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    nodes: Vec<Option<Vec<f32>>>,
    neighbors: Vec<Vec<usize>>,
    entry_point: Option<usize>,
}

impl GraphBackend {
    #[must_use]
    pub fn new(dim: usize, config: &HnswConfig) -> Self {
        Self {
            dim,
            m: config.m,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            nodes: Vec::new(),
            neighbors: Vec::new(),
            entry_point: None,
        }
    }

    fn score(&self, a: &[f32], position: usize) -> f32 {
        self.nodes[position]
            .as_ref()
            .map_or(f32::MIN, |b| a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
    }

    /// Greedy best-first search over the graph, returning up to `ef`
    /// candidates ordered by descending score.
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<ScoredNode> {
        let mut visited = HashSet::new();
        visited.insert(entry);

        let mut candidates = BinaryHeap::new();
        let mut results: Vec<ScoredNode> = Vec::new();

        let entry_score = self.score(query, entry);
        candidates.push(ScoredNode { position: entry, score: entry_score });
        if !is_deleted(entry) {
            results.push(ScoredNode { position: entry, score: entry_score });
        }

        while let Some(current) = candidates.pop() {
            if let Some(worst) = results.iter().map(|n| n.score).fold(None, |acc: Option<f32>, s| {
                Some(acc.map_or(s, |a| a.min(s)))
            }) {
                if results.len() >= ef && current.score < worst {
                    break;
                }
            }

            for &neighbor in &self.neighbors[current.position] {
                if visited.insert(neighbor) {
                    let neighbor_score = self.score(query, neighbor);
                    candidates.push(ScoredNode { position: neighbor, score: neighbor_score });
                    if !is_deleted(neighbor) {
                        results.push(ScoredNode { position: neighbor, score: neighbor_score });
                    }
                }
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(ef);
        results
    }
}

impl AnnBackend for GraphBackend {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        if vector.len() != self.dim {
            return Err(VectorError::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let position = self.nodes.len();
        self.nodes.push(Some(vector.to_vec()));
        self.neighbors.push(Vec::new());

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(position);
            return Ok(position);
        };

        let candidates = self.search_layer(vector, entry, self.ef_construction, &|_| false);
        let mut neighbors: Vec<usize> = candidates
            .into_iter()
            .filter(|c| c.position != position)
            .take(self.m)
            .map(|c| c.position)
            .collect();
        neighbors.truncate(self.m);

        for &neighbor in &neighbors {
            self.neighbors[neighbor].push(position);
            if self.neighbors[neighbor].len() > self.m {
                // Drop the weakest edge to keep degree bounded.
                let query = self.nodes[neighbor].clone().unwrap_or_default();
                self.neighbors[neighbor].sort_by(|&a, &b| {
                    self.score(&query, b).partial_cmp(&self.score(&query, a)).unwrap_or(Ordering::Equal)
                });
                self.neighbors[neighbor].truncate(self.m);
            }
        }
        self.neighbors[position] = neighbors;

        Ok(position)
    }

    fn remove(&mut self, position: usize) {
        if let Some(slot) = self.nodes.get_mut(position) {
            *slot = None;
        }
        if self.entry_point == Some(position) {
            self.entry_point = self.nodes.iter().position(Option::is_some);
        }
    }

    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate> {
        let Some(entry) = self.entry_point else { return Vec::new() };
        let ef = self.ef_search.max(k);
        self.search_layer(query, entry, ef, is_deleted)
            .into_iter()
            .take(k)
            .map(|n| Candidate { position: n.position, score: n.score })
            .collect()
    }

    fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn get_vector(&self, position: usize) -> Option<Vec<f32>> {
        self.nodes.get(position)?.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_match_among_random_points() {
        let config = HnswConfig { m: 8, ef_construction: 64, ef_search: 32 };
        let mut backend = GraphBackend::new(2, &config);
        let vectors = [
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
            vec![0.7, 0.7],
        ];
        for v in &vectors {
            backend.add(v).unwrap();
        }
        let results = backend.search(&[1.0, 0.0], 1, &|_| false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 0);
    }
}
