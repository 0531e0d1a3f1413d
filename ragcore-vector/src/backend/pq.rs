//! Inverted-list + product-quantization backend for the largest
//! populations: vectors are bucketed like [`super::ivf::IvfBackend`], but
//! stored compressed (one byte per sub-quantizer) instead of as raw
//! floats, trading a small amount of recall for an order-of-magnitude
//! smaller resident set.

use super::kmeans::{kmeans, nearest_centroid, squared_distance};
use super::{AnnBackend, Candidate};
use crate::error::VectorError;
use ragcore_config::{IvfConfig, PqConfig};

struct SubQuantizer {
    centroids: Vec<Vec<f32>>,
}

pub struct PqBackend {
    dim: usize,
    sub_quantizers: Vec<SubQuantizer>,
    sub_dim: usize,
    coarse_centroids: Vec<Vec<f32>>,
    /// One inverted list per coarse centroid: (position, per-subvector code).
    lists: Vec<Vec<(usize, Vec<u8>)>>,
    next_position: usize,
}

impl PqBackend {
    /// Train coarse (IVF) centroids and per-segment PQ codebooks from
    /// `training_vectors`.
    #[must_use]
    pub fn train(
        training_vectors: &[Vec<f32>],
        dim: usize,
        ivf_config: &IvfConfig,
        pq_config: &PqConfig,
    ) -> Self {
        let sub_quantizers_count = pq_config.sub_quantizers.max(1).min(dim.max(1));
        let sub_dim = (dim / sub_quantizers_count).max(1);

        let sample: Vec<Vec<f32>> = training_vectors
            .iter()
            .take(ivf_config.training_sample_size)
            .cloned()
            .collect();

        let coarse_centroids = if sample.is_empty() {
            vec![vec![0.0; dim]; 1]
        } else {
            let n_clusters = pq_config.n_clusters.min(sample.len()).max(1);
            kmeans(&sample, n_clusters, dim, 10)
        };

        let n_codes = 1usize << pq_config.bits_per_code.min(8);
        let sub_quantizers = (0..sub_quantizers_count)
            .map(|s| {
                let start = s * sub_dim;
                let end = (start + sub_dim).min(dim);
                let segments: Vec<Vec<f32>> = sample
                    .iter()
                    .map(|v| v.get(start..end).unwrap_or(&[]).to_vec())
                    .filter(|seg| !seg.is_empty())
                    .collect();
                let centroids = if segments.is_empty() {
                    vec![vec![0.0; sub_dim]; 1]
                } else {
                    kmeans(&segments, n_codes.min(segments.len()).max(1), sub_dim, 8)
                };
                SubQuantizer { centroids }
            })
            .collect();

        Self {
            dim,
            sub_quantizers,
            sub_dim,
            coarse_centroids,
            lists: vec![Vec::new(); 1.max(pq_config.n_clusters.min(sample.len().max(1)))],
            next_position: 0,
        }
    }

    fn encode(&self, vector: &[f32]) -> Vec<u8> {
        self.sub_quantizers
            .iter()
            .enumerate()
            .map(|(s, sq)| {
                let start = s * self.sub_dim;
                let end = (start + self.sub_dim).min(vector.len());
                let segment = vector.get(start..end).unwrap_or(&[]);
                nearest_centroid(segment, &sq.centroids) as u8
            })
            .collect()
    }

    /// Asymmetric distance: query kept as full-precision float, codes
    /// decoded against their sub-quantizer centroids.
    fn approximate_score(&self, query: &[f32], code: &[u8]) -> f32 {
        let mut total = 0f32;
        for (s, sq) in self.sub_quantizers.iter().enumerate() {
            let start = s * self.sub_dim;
            let end = (start + self.sub_dim).min(query.len());
            let segment = query.get(start..end).unwrap_or(&[]);
            let centroid = &sq.centroids[code[s] as usize % sq.centroids.len()];
            total -= squared_distance(segment, centroid);
        }
        total
    }
}

impl AnnBackend for PqBackend {
    fn name(&self) -> &'static str {
        "ivf_pq"
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        if vector.len() != self.dim {
            return Err(VectorError::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let cluster = nearest_centroid(vector, &self.coarse_centroids).min(self.lists.len() - 1);
        let code = self.encode(vector);
        let position = self.next_position;
        self.next_position += 1;
        self.lists[cluster].push((position, code));
        Ok(position)
    }

    fn remove(&mut self, position: usize) {
        for list in &mut self.lists {
            list.retain(|(p, _)| *p != position);
        }
    }

    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate> {
        let nprobe = (2 * k).max(64).min(self.coarse_centroids.len()).max(1);
        let mut cluster_order: Vec<usize> = (0..self.coarse_centroids.len()).collect();
        cluster_order.sort_by(|&a, &b| {
            squared_distance(query, &self.coarse_centroids[a])
                .partial_cmp(&squared_distance(query, &self.coarse_centroids[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut scored: Vec<Candidate> = Vec::new();
        for &cluster in cluster_order.iter().take(nprobe) {
            for (position, code) in &self.lists[cluster] {
                if is_deleted(*position) {
                    continue;
                }
                scored.push(Candidate { position: *position, score: self.approximate_score(query, code) });
            }
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Dequantize the stored code back into a full-length vector. Lossy —
    /// each segment is replaced by its sub-quantizer centroid — which is
    /// the tradeoff this backend exists to make; a rebuild from these
    /// reconstructions will not bit-for-bit match the originals.
    fn get_vector(&self, position: usize) -> Option<Vec<f32>> {
        let code = self.lists.iter().flatten().find(|(p, _)| *p == position).map(|(_, c)| c)?;
        let mut reconstructed = Vec::with_capacity(self.dim);
        for (s, sq) in self.sub_quantizers.iter().enumerate() {
            let centroid = &sq.centroids[code[s] as usize % sq.centroids.len()];
            reconstructed.extend_from_slice(centroid);
        }
        reconstructed.truncate(self.dim);
        Some(reconstructed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_search_prefers_closer_point() {
        let ivf_config = IvfConfig { min_clusters: 1, max_clusters: 4, training_sample_size: 100 };
        let pq_config = PqConfig { n_clusters: 2, sub_quantizers: 2, bits_per_code: 4 };
        let training = vec![vec![1.0, 0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0, 1.0], vec![-1.0, 0.0, -1.0, 0.0]];
        let mut backend = PqBackend::train(&training, 4, &ivf_config, &pq_config);
        for v in &training {
            backend.add(v).unwrap();
        }
        let results = backend.search(&[1.0, 0.0, 1.0, 0.0], 1, &|_| false);
        assert_eq!(results.len(), 1);
    }
}
