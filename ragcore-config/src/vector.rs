//! Vector index configuration.

use serde::{Deserialize, Serialize};

/// Population thresholds and per-backend tuning for the self-optimizing
/// vector index.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// Embedding dimensionality. Fixed once the first vector is added.
    pub dimensions: usize,
    /// Below this population, use the flat (brute-force) backend.
    pub flat_threshold: usize,
    /// Below this population, use the inverted-list (IVF) backend.
    pub ivf_threshold: usize,
    /// Below this population, use the graph (HNSW) backend; at or above,
    /// use the inverted-list + product-quantization backend.
    pub hnsw_threshold: usize,
    pub hnsw: HnswConfig,
    pub ivf: IvfConfig,
    pub pq: PqConfig,
    /// Soft-rebuild trigger: fraction of logically-deleted vectors that
    /// causes an in-place compaction on the next maintenance pass.
    pub soft_rebuild_deletion_ratio: f32,
    /// Hard-rebuild trigger: fraction of logically-deleted vectors that
    /// forces a full rebuild at startup.
    pub hard_rebuild_deletion_ratio: f32,
    /// Number of vectors processed per batch during a rebuild.
    pub rebuild_batch_size: usize,
    /// Directory holding the index binary, payload blob and backups.
    pub persistence_path: std::path::PathBuf,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: 1024,
            flat_threshold: 10_000,
            ivf_threshold: 100_000,
            hnsw_threshold: 1_000_000,
            hnsw: HnswConfig::default(),
            ivf: IvfConfig::default(),
            pq: PqConfig::default(),
            soft_rebuild_deletion_ratio: 0.15,
            hard_rebuild_deletion_ratio: 0.20,
            rebuild_batch_size: 10_000,
            persistence_path: std::path::PathBuf::from("data/vectors/index"),
        }
    }
}

impl VectorIndexConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimensions == 0 {
            return Err("vector_index.dimensions must be non-zero".into());
        }
        if self.flat_threshold >= self.ivf_threshold || self.ivf_threshold >= self.hnsw_threshold {
            return Err(
                "vector_index thresholds must be strictly increasing: flat < ivf < hnsw".into(),
            );
        }
        if !(0.0..1.0).contains(&self.soft_rebuild_deletion_ratio) {
            return Err("vector_index.soft_rebuild_deletion_ratio must be in [0, 1)".into());
        }
        if self.hard_rebuild_deletion_ratio <= self.soft_rebuild_deletion_ratio {
            return Err(
                "vector_index.hard_rebuild_deletion_ratio must exceed soft_rebuild_deletion_ratio"
                    .into(),
            );
        }
        Ok(())
    }
}

/// HNSW (graph backend) tuning parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Bi-directional links per node.
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// Inverted-list (IVF) tuning parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IvfConfig {
    /// Minimum number of clusters, regardless of population.
    pub min_clusters: usize,
    /// Maximum number of clusters, regardless of population.
    pub max_clusters: usize,
    /// Fraction of training-set size drawn for k-means initialization when
    /// the full corpus exceeds `training_sample_size`.
    pub training_sample_size: usize,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self {
            min_clusters: 100,
            max_clusters: 4096,
            training_sample_size: 50_000,
        }
    }
}

/// Product-quantization parameters used by the inverted-list + PQ backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PqConfig {
    pub n_clusters: usize,
    /// Number of sub-quantizers; `dimensions` must be divisible by this.
    pub sub_quantizers: usize,
    pub bits_per_code: u8,
}

impl Default for PqConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4096,
            sub_quantizers: 64,
            bits_per_code: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        VectorIndexConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_increasing_thresholds() {
        let mut cfg = VectorIndexConfig::default();
        cfg.ivf_threshold = cfg.flat_threshold;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_hard_below_soft_ratio() {
        let mut cfg = VectorIndexConfig::default();
        cfg.hard_rebuild_deletion_ratio = cfg.soft_rebuild_deletion_ratio;
        assert!(cfg.validate().is_err());
    }
}
