//! Inverted-list (IVF) backend: vectors are bucketed by nearest centroid
//! at training time, and a search only scans the `nprobe` buckets whose
//! centroids are closest to the query.

use super::kmeans::{kmeans, nearest_centroid};
use super::{AnnBackend, Candidate};
use crate::error::VectorError;
use ragcore_config::IvfConfig;

pub struct IvfBackend {
    dim: usize,
    centroids: Vec<Vec<f32>>,
    /// One inverted list per centroid, holding (position, vector) pairs.
    lists: Vec<Vec<(usize, Vec<f32>)>>,
    next_position: usize,
}

impl IvfBackend {
    /// Train cluster centroids from `training_vectors` (capped at
    /// `config.training_sample_size`) and build an IVF backend over them;
    /// the caller is responsible for re-inserting every vector — this
    /// constructor does not assume `training_vectors` is the complete set.
    #[must_use]
    pub fn train(training_vectors: &[Vec<f32>], dim: usize, population_estimate: usize, config: &IvfConfig) -> Self {
        let n_clusters = ((population_estimate as f64).sqrt() * 2.0).round() as usize;
        let n_clusters = n_clusters.clamp(config.min_clusters, config.max_clusters).max(1);

        let sample: Vec<Vec<f32>> = training_vectors
            .iter()
            .take(config.training_sample_size)
            .cloned()
            .collect();
        let centroids = if sample.is_empty() {
            vec![vec![0.0; dim]; 1]
        } else {
            kmeans(&sample, n_clusters.min(sample.len()).max(1), dim, 10)
        };

        Self {
            dim,
            lists: vec![Vec::new(); centroids.len()],
            centroids,
            next_position: 0,
        }
    }

    /// `nprobe`: number of clusters scanned per query, scaled with `k` the
    /// way the production index this is modeled on scales it (at least
    /// `2k`, at least 5% of clusters), clamped to the cluster count.
    fn nprobe(&self, k: usize) -> usize {
        let n = self.centroids.len();
        (2 * k).max(n / 20).min(n).max(1)
    }
}

impl AnnBackend for IvfBackend {
    fn name(&self) -> &'static str {
        "ivf"
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        if vector.len() != self.dim {
            return Err(VectorError::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let cluster = nearest_centroid(vector, &self.centroids);
        let position = self.next_position;
        self.next_position += 1;
        self.lists[cluster].push((position, vector.to_vec()));
        Ok(position)
    }

    fn remove(&mut self, position: usize) {
        for list in &mut self.lists {
            list.retain(|(p, _)| *p != position);
        }
    }

    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate> {
        let nprobe = self.nprobe(k);
        let mut cluster_order: Vec<usize> = (0..self.centroids.len()).collect();
        cluster_order.sort_by(|&a, &b| {
            super::kmeans::squared_distance(query, &self.centroids[a])
                .partial_cmp(&super::kmeans::squared_distance(query, &self.centroids[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut scored: Vec<Candidate> = Vec::new();
        for &cluster in cluster_order.iter().take(nprobe) {
            for (position, vector) in &self.lists[cluster] {
                if is_deleted(*position) {
                    continue;
                }
                let score: f32 = query.iter().zip(vector.iter()).map(|(a, b)| a * b).sum();
                scored.push(Candidate { position: *position, score });
            }
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    fn get_vector(&self, position: usize) -> Option<Vec<f32>> {
        self.lists
            .iter()
            .flatten()
            .find(|(p, _)| *p == position)
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IvfConfig {
        IvfConfig { min_clusters: 2, max_clusters: 16, training_sample_size: 1000 }
    }

    #[test]
    fn trains_and_finds_nearest() {
        let training = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]];
        let mut backend = IvfBackend::train(&training, 2, training.len(), &config());
        for v in &training {
            backend.add(v).unwrap();
        }
        let results = backend.search(&[1.0, 0.0], 1, &|_| false);
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0.9);
    }
}
