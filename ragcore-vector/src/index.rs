//! `VectorIndex`: the self-optimizing ANN index.
//!
//! Automatically selects among the flat, inverted-list, graph and
//! inverted-list+PQ backends based on live population, persists atomically
//! via temp-file-then-rename, and rebuilds itself (soft, in-place compaction
//! below the hard threshold; full rebuild at or above it) as deletions
//! accumulate.

use crate::backend::{AnnBackend, Backend, BackendKind};
use crate::error::VectorError;
use crate::filterable::enrich_metadata;
use crate::types::{StorageStats, VectorResult};
use ragcore_config::VectorIndexConfig;
use ragcore_core::error::CoreError;
use ragcore_core::traits::Embedder;
use ragcore_metadata::MetadataRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::collections::HashSet;

struct IndexInner {
    backend: Backend,
    /// internal position -> vector_id
    position_to_id: Vec<Option<String>>,
    id_to_position: HashMap<String, usize>,
    id_to_metadata: HashMap<String, MetadataRecord>,
    deleted_ids: HashSet<String>,
    next_id: u64,
    /// Live embedding dimension. Starts at `config.dimensions`; changed in
    /// place by [`VectorIndex::migrate_to_new_dimension`] and
    /// [`VectorIndex::force_rebuild_for_new_dimension`].
    dim: usize,
}

/// Result of [`VectorIndex::check_dimension_compatibility`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionCompatibility {
    pub compatible: bool,
    pub current_dimensions: usize,
    pub requested_dimensions: usize,
    pub live_vectors: usize,
    pub requires_reembedding: bool,
}

/// Snapshot of everything except the raw vectors, written to the payload
/// blob on every save.
#[derive(Serialize, Deserialize)]
struct PayloadSnapshot {
    id_to_metadata: HashMap<String, MetadataRecord>,
    position_to_id: Vec<Option<String>>,
    next_id: u64,
    deleted_ids: HashSet<String>,
    index_stats: StorageStats,
    saved_at: chrono::DateTime<chrono::Utc>,
}

/// Snapshot of the raw vectors and which backend produced them, written to
/// the index binary on every save so the ANN structure can be rebuilt on
/// load (the backends here don't serialize their internal graph/cluster
/// structures directly; rebuilding from the vectors is cheap at the scale
/// this workspace targets).
#[derive(Serialize, Deserialize)]
struct IndexBinary {
    kind: BackendKind,
    dim: usize,
    vectors: Vec<(String, Vec<f32>)>,
}

pub struct VectorIndex {
    config: VectorIndexConfig,
    inner: parking_lot::RwLock<IndexInner>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex").field("config", &self.config).finish_non_exhaustive()
    }
}

impl VectorIndex {
    #[must_use]
    pub fn new(config: VectorIndexConfig) -> Self {
        let dim = config.dimensions;
        let backend = Backend::build(BackendKind::Flat, dim, &[], 0, &config);
        Self {
            config,
            inner: parking_lot::RwLock::new(IndexInner {
                backend,
                position_to_id: Vec::new(),
                id_to_position: HashMap::new(),
                id_to_metadata: HashMap::new(),
                deleted_ids: HashSet::new(),
                next_id: 0,
                dim,
            }),
        }
    }

    /// Insert vectors with their already-merged metadata records. Each
    /// vector is unit-normalized (callers may pass raw embeddings).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if a vector's dimension doesn't match the
    /// index's configured dimension.
    pub fn add_vectors(&self, items: Vec<(Vec<f32>, MetadataRecord)>) -> Result<Vec<String>, CoreError> {
        let mut inner = self.inner.write();
        let mut ids = Vec::with_capacity(items.len());
        for (raw, mut metadata) in items {
            if raw.len() != inner.dim {
                return Err(VectorError::DimensionMismatch {
                    expected: inner.dim,
                    actual: raw.len(),
                }
                .into());
            }
            enrich_metadata(&mut metadata);
            let vector = normalize(&raw);
            let id = metadata.vector_id.clone();
            let position = inner.backend.add(&vector).map_err(CoreError::from)?;
            if position >= inner.position_to_id.len() {
                inner.position_to_id.resize(position + 1, None);
            }
            inner.position_to_id[position] = Some(id.clone());
            inner.id_to_position.insert(id.clone(), position);
            inner.id_to_metadata.insert(id.clone(), metadata);
            inner.next_id += 1;
            ids.push(id);
        }
        drop(inner);
        self.maybe_rebuild();
        self.maybe_migrate_variant();
        Ok(ids)
    }

    /// Logically delete vectors by id. They stop appearing in search
    /// results immediately; physical removal happens at the next rebuild.
    ///
    /// # Errors
    ///
    /// Never fails today; returns `Result` for forward compatibility with
    /// a persisted tombstone log.
    pub fn delete(&self, ids: &[String]) -> Result<(), CoreError> {
        let mut inner = self.inner.write();
        for id in ids {
            if let Some(&position) = inner.id_to_position.get(id) {
                inner.backend.remove(position);
            }
            inner.deleted_ids.insert(id.clone());
        }
        drop(inner);
        self.maybe_rebuild();
        Ok(())
    }

    /// Search for the `k` nearest vectors to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidParameter`] if `query`'s dimension
    /// doesn't match the index, or `k` is zero.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorResult>, CoreError> {
        if k == 0 {
            return Err(VectorError::InvalidK(k).into());
        }
        let inner = self.inner.read();
        if query.len() != inner.dim {
            return Err(VectorError::DimensionMismatch {
                expected: inner.dim,
                actual: query.len(),
            }
            .into());
        }
        let normalized = normalize(query);
        let deleted = &inner.deleted_ids;
        let position_to_id = &inner.position_to_id;
        let is_deleted = |position: usize| -> bool {
            position_to_id
                .get(position)
                .and_then(Option::as_ref)
                .map_or(true, |id| deleted.contains(id))
        };
        let candidates = inner.backend.search(&normalized, k, &is_deleted);
        Ok(candidates
            .into_iter()
            .filter_map(|c| {
                let id = inner.position_to_id.get(c.position)?.clone()?;
                let metadata = inner.id_to_metadata.get(&id)?;
                Some(VectorResult {
                    id,
                    score: c.score,
                    metadata: Some(flatten_metadata(metadata)),
                })
            })
            .collect())
    }

    /// Like [`Self::search`], but returns flat payload maps instead of
    /// [`VectorResult`]: `vector_id`, `similarity_score`/`score` (aliases),
    /// `text`/`content` (aliases), `chunk_index`/`chunk_id` (aliases), plus
    /// every other metadata field, with no nested `metadata` key.
    ///
    /// # Errors
    ///
    /// See [`Self::search`].
    pub fn search_with_metadata(&self, query: &[f32], k: usize) -> Result<Vec<HashMap<String, Value>>, CoreError> {
        let results = self.search(query, k)?;
        Ok(results
            .into_iter()
            .map(|r| {
                let mut map = r.metadata.unwrap_or_default();
                map.insert("vector_id".to_string(), Value::String(r.id));
                map.insert("similarity_score".to_string(), Value::from(r.score));
                map.insert("score".to_string(), Value::from(r.score));
                if let Some(text) = map.get("text").cloned() {
                    map.insert("content".to_string(), text);
                }
                if let Some(chunk_index) = map.get("chunk_index").cloned() {
                    map.insert("chunk_id".to_string(), chunk_index);
                }
                map
            })
            .collect())
    }

    /// Fetch the live metadata record for `id`, or `None` if it doesn't
    /// exist or has been deleted.
    #[must_use]
    pub fn get_metadata(&self, id: &str) -> Option<MetadataRecord> {
        let inner = self.inner.read();
        if inner.deleted_ids.contains(id) {
            return None;
        }
        inner.id_to_metadata.get(id).cloned()
    }

    /// Merge `updates` onto the record for `id` in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] wrapping [`VectorError::NotFound`]
    /// if `id` doesn't exist or is deleted.
    pub fn update_metadata(&self, id: &str, updates: Map<String, Value>) -> Result<(), CoreError> {
        let mut inner = self.inner.write();
        if inner.deleted_ids.contains(id) || !inner.id_to_metadata.contains_key(id) {
            return Err(VectorError::NotFound(id.to_string()).into());
        }
        let record = &inner.id_to_metadata[id];
        let mut value = serde_json::to_value(record).map_err(|e| VectorError::Persistence(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            for (key, val) in updates {
                map.insert(key, val);
            }
        }
        let updated: MetadataRecord =
            serde_json::from_value(value).map_err(|e| VectorError::Persistence(e.to_string()))?;
        inner.id_to_metadata.insert(id.to_string(), updated);
        Ok(())
    }

    /// Vector ids of every live record whose `doc_path` equals `doc_path`.
    #[must_use]
    pub fn find_vectors_by_doc_path(&self, doc_path: &str) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .id_to_metadata
            .iter()
            .filter(|(id, record)| !inner.deleted_ids.contains(*id) && record.doc_path.as_deref() == Some(doc_path))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Logically delete every live vector whose `doc_path` equals
    /// `doc_path`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// See [`Self::delete`].
    pub fn delete_vectors_by_doc_path(&self, doc_path: &str) -> Result<usize, CoreError> {
        let ids = self.find_vectors_by_doc_path(doc_path);
        let count = ids.len();
        self.delete(&ids)?;
        Ok(count)
    }

    /// Vector ids of prior live records identifying the same source file,
    /// tried in priority order: `doc_path`, then `filename`, then
    /// `file_path`. Returns the first non-empty match.
    #[must_use]
    pub fn find_by_path_identity(&self, doc_path: Option<&str>, filename: Option<&str>, file_path: Option<&str>) -> Vec<String> {
        let inner = self.inner.read();
        let is_live = |id: &String| !inner.deleted_ids.contains(id);

        if let Some(path) = doc_path {
            let hits: Vec<String> = inner
                .id_to_metadata
                .iter()
                .filter(|(id, record)| is_live(id) && record.doc_path.as_deref() == Some(path))
                .map(|(id, _)| id.clone())
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        if let Some(name) = filename {
            let hits: Vec<String> = inner
                .id_to_metadata
                .iter()
                .filter(|(id, record)| is_live(id) && record.filename.as_deref() == Some(name))
                .map(|(id, _)| id.clone())
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        if let Some(path) = file_path {
            let hits: Vec<String> = inner
                .id_to_metadata
                .iter()
                .filter(|(id, record)| is_live(id) && record.file_path.as_deref() == Some(path))
                .map(|(id, _)| id.clone())
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }

    /// Wipe every vector, metadata record and tombstone, resetting to an
    /// empty flat backend at the current dimension.
    ///
    /// # Errors
    ///
    /// Never fails today; returns `Result` for symmetry with the other
    /// mutating operations.
    pub fn clear(&self) -> Result<(), CoreError> {
        let mut inner = self.inner.write();
        let dim = inner.dim;
        inner.backend = Backend::build(BackendKind::Flat, dim, &[], 0, &self.config);
        inner.position_to_id.clear();
        inner.id_to_position.clear();
        inner.id_to_metadata.clear();
        inner.deleted_ids.clear();
        inner.next_id = 0;
        Ok(())
    }

    /// Report whether the index can accept `new_dim`-dimensional vectors
    /// without re-embedding, and how many live vectors would need it if not.
    #[must_use]
    pub fn check_dimension_compatibility(&self, new_dim: usize) -> DimensionCompatibility {
        let inner = self.inner.read();
        let live = inner.id_to_position.len() - inner.deleted_ids.len();
        DimensionCompatibility {
            compatible: new_dim == inner.dim,
            current_dimensions: inner.dim,
            requested_dimensions: new_dim,
            live_vectors: live,
            requires_reembedding: new_dim != inner.dim && live > 0,
        }
    }

    /// Re-embed every live record's stored text through `embedder` and
    /// recreate the index at `new_dim`, preserving every record's metadata.
    /// On any failure, the pre-migration state is restored from a temporary
    /// backup and the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures, a post-embed dimension mismatch, or
    /// any I/O failure from the backup/restore it wraps the migration in.
    pub async fn migrate_to_new_dimension(&self, new_dim: usize, embedder: &dyn Embedder) -> Result<(), CoreError> {
        let backup_path = self.config.persistence_path.with_extension("migration_backup");
        self.backup(&backup_path)?;

        let result = self.migrate_to_new_dimension_inner(new_dim, embedder).await;
        if let Err(ref err) = result {
            tracing::error!(%err, "dimension migration failed, restoring pre-migration backup");
            self.restore(&backup_path)?;
        }
        let _ = std::fs::remove_file(&backup_path);
        let _ = std::fs::remove_file(payload_path(&backup_path));
        result
    }

    async fn migrate_to_new_dimension_inner(&self, new_dim: usize, embedder: &dyn Embedder) -> Result<(), CoreError> {
        let live: Vec<(String, MetadataRecord)> = {
            let inner = self.inner.read();
            inner
                .id_to_metadata
                .iter()
                .filter(|(id, _)| !inner.deleted_ids.contains(*id))
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect()
        };

        let texts: Vec<String> = live.iter().map(|(_, record)| record.text.clone()).collect();
        let embeddings = embedder.embed_texts(&texts).await?;
        if embeddings.iter().any(|e| e.len() != new_dim) {
            return Err(VectorError::DimensionMismatch {
                expected: new_dim,
                actual: embeddings.iter().map(Vec::len).find(|&len| len != new_dim).unwrap_or(0),
            }
            .into());
        }

        let mut inner = self.inner.write();
        let population = live.len();
        let kind = BackendKind::for_population(population, &self.config);
        let mut backend = Backend::build(kind, new_dim, &embeddings, population, &self.config);

        let mut position_to_id = Vec::with_capacity(population);
        let mut id_to_position = HashMap::with_capacity(population);
        let mut id_to_metadata = HashMap::with_capacity(population);
        for ((id, metadata), embedding) in live.into_iter().zip(embeddings.into_iter()) {
            let normalized = normalize(&embedding);
            if let Ok(position) = backend.add(&normalized) {
                position_to_id.push(Some(id.clone()));
                id_to_position.insert(id.clone(), position);
                id_to_metadata.insert(id, metadata);
            }
        }

        inner.backend = backend;
        inner.position_to_id = position_to_id;
        inner.id_to_position = id_to_position;
        inner.id_to_metadata = id_to_metadata;
        inner.deleted_ids.clear();
        inner.dim = new_dim;
        Ok(())
    }

    /// Wipe and reinitialize the index at `new_dim` without attempting to
    /// preserve or re-embed any existing vectors.
    ///
    /// # Errors
    ///
    /// Never fails today; returns `Result` for symmetry with
    /// [`Self::migrate_to_new_dimension`].
    pub fn force_rebuild_for_new_dimension(&self, new_dim: usize) -> Result<(), CoreError> {
        let mut inner = self.inner.write();
        inner.backend = Backend::build(BackendKind::Flat, new_dim, &[], 0, &self.config);
        inner.position_to_id.clear();
        inner.id_to_position.clear();
        inner.id_to_metadata.clear();
        inner.deleted_ids.clear();
        inner.next_id = 0;
        inner.dim = new_dim;
        Ok(())
    }

    /// Every non-deleted record, sorted by vector id. Used for cursor-based
    /// scroll pagination, where "sorted by id" stands in for the server-side
    /// point ordering a real collection would give a scroll cursor.
    #[must_use]
    pub fn live_records_sorted_by_id(&self) -> Vec<MetadataRecord> {
        let inner = self.inner.read();
        let mut records: Vec<MetadataRecord> = inner
            .id_to_metadata
            .iter()
            .filter(|(id, _)| !inner.deleted_ids.contains(*id))
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.vector_id.cmp(&b.vector_id));
        records
    }

    #[must_use]
    pub fn stats(&self) -> StorageStats {
        let inner = self.inner.read();
        StorageStats {
            total_vectors: inner.id_to_position.len() - inner.deleted_ids.len(),
            deleted_vectors: inner.deleted_ids.len(),
            dimensions: inner.dim,
            backend: inner.backend.name().to_string(),
            index_build_time_ms: None,
        }
    }

    /// Soft-rebuild (compact in place, same backend kind) once the
    /// deletion ratio crosses `soft_rebuild_deletion_ratio`. The hard
    /// threshold is not enforced here: it's a startup-only check (see
    /// [`Self::load`]), not a continuous runtime one.
    fn maybe_rebuild(&self) {
        let ratio = {
            let inner = self.inner.read();
            let total = inner.id_to_position.len();
            if total == 0 {
                return;
            }
            inner.deleted_ids.len() as f32 / total as f32
        };
        if ratio >= self.config.soft_rebuild_deletion_ratio {
            self.rebuild(false);
        }
    }

    /// Re-evaluate the backend kind against live population growth and
    /// migrate (hard rebuild) if it no longer matches, so the index keeps
    /// self-optimizing off pure growth and not only off deletion ratio.
    fn maybe_migrate_variant(&self) {
        let (population, current_kind) = {
            let inner = self.inner.read();
            (inner.id_to_position.len() - inner.deleted_ids.len(), inner.backend.kind())
        };
        if BackendKind::for_population(population, &self.config) != current_kind {
            self.rebuild(true);
        }
    }

    /// Rebuild the index from its live vectors. `force_kind_reselect`
    /// chooses a fresh backend kind from the post-compaction population
    /// (the hard-rebuild path); a soft rebuild keeps the current kind.
    pub fn rebuild(&self, force_kind_reselect: bool) {
        let mut inner = self.inner.write();
        let live: Vec<(String, Vec<f32>, MetadataRecord)> = inner
            .position_to_id
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                let id = id.as_ref()?;
                if inner.deleted_ids.contains(id) {
                    return None;
                }
                let metadata = inner.id_to_metadata.get(id)?.clone();
                let vector = reconstruct_vector(&inner.backend, position)?;
                Some((id.clone(), vector, metadata))
            })
            .collect();

        tracing::info!(live = live.len(), force_kind_reselect, "rebuilding vector index");

        let kind = if force_kind_reselect {
            BackendKind::for_population(live.len(), &self.config)
        } else {
            inner.backend.kind()
        };
        let dim = inner.dim;
        let training: Vec<Vec<f32>> = live.iter().map(|(_, v, _)| v.clone()).collect();
        let mut backend = Backend::build(kind, dim, &training, live.len(), &self.config);

        let mut position_to_id = Vec::with_capacity(live.len());
        let mut id_to_position = HashMap::with_capacity(live.len());
        let mut id_to_metadata = HashMap::with_capacity(live.len());
        for (id, vector, metadata) in live {
            if let Ok(position) = backend.add(&vector) {
                position_to_id.push(Some(id.clone()));
                id_to_position.insert(id.clone(), position);
                id_to_metadata.insert(id, metadata);
            }
        }

        inner.backend = backend;
        inner.position_to_id = position_to_id;
        inner.id_to_position = id_to_position;
        inner.id_to_metadata = id_to_metadata;
        inner.deleted_ids.clear();
    }

    /// Atomically persist the index binary and payload blob to the
    /// configured persistence path via temp-file-then-rename, so a reader
    /// never observes a half-written file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] on any I/O or serialization
    /// failure.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&self.config.persistence_path)
    }

    /// Like [`Self::save`], but to an arbitrary path rather than the
    /// configured persistence path. Used for point-in-time snapshots ahead
    /// of a risky operation (e.g. [`Self::migrate_to_new_dimension`]).
    ///
    /// # Errors
    ///
    /// See [`Self::save`].
    pub fn backup(&self, path: &std::path::Path) -> Result<(), CoreError> {
        self.save_to(path)
    }

    fn save_to(&self, index_path: &std::path::Path) -> Result<(), CoreError> {
        let inner = self.inner.read();
        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let vectors: Vec<(String, Vec<f32>)> = inner
            .position_to_id
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                let id = id.as_ref()?;
                let vector = reconstruct_vector(&inner.backend, position)?;
                Some((id.clone(), vector))
            })
            .collect();
        let binary = IndexBinary { kind: inner.backend.kind(), dim: inner.dim, vectors };
        let payload = PayloadSnapshot {
            id_to_metadata: inner.id_to_metadata.clone(),
            position_to_id: inner.position_to_id.clone(),
            next_id: inner.next_id,
            deleted_ids: inner.deleted_ids.clone(),
            index_stats: self.stats(),
            saved_at: chrono::Utc::now(),
        };
        drop(inner);

        atomic_write(index_path, &rmp_serde::to_vec(&binary).map_err(|e| VectorError::Persistence(e.to_string()))?)?;
        let payload_path = payload_path(index_path);
        atomic_write(&payload_path, &rmp_serde::to_vec(&payload).map_err(|e| VectorError::Persistence(e.to_string()))?)?;
        Ok(())
    }

    /// Replace this index's state in place with whatever was written to
    /// `path` by [`Self::save`]/[`Self::backup`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] if either file is missing,
    /// unreadable, or fails to deserialize.
    pub fn restore(&self, path: &std::path::Path) -> Result<(), CoreError> {
        let binary_bytes = std::fs::read(path)?;
        let binary: IndexBinary =
            rmp_serde::from_slice(&binary_bytes).map_err(|e| VectorError::Persistence(e.to_string()))?;
        let payload_bytes = std::fs::read(payload_path(path))?;
        let payload: PayloadSnapshot =
            rmp_serde::from_slice(&payload_bytes).map_err(|e| VectorError::Persistence(e.to_string()))?;

        let training: Vec<Vec<f32>> = binary.vectors.iter().map(|(_, v)| v.clone()).collect();
        let mut backend = Backend::build(binary.kind, binary.dim, &training, binary.vectors.len(), &self.config);

        let mut id_to_position = HashMap::new();
        let mut position_to_id = Vec::new();
        for (id, vector) in &binary.vectors {
            let position = backend.add(vector).map_err(CoreError::from)?;
            if position >= position_to_id.len() {
                position_to_id.resize(position + 1, None);
            }
            position_to_id[position] = Some(id.clone());
            id_to_position.insert(id.clone(), position);
        }

        let mut inner = self.inner.write();
        inner.backend = backend;
        inner.position_to_id = position_to_id;
        inner.id_to_position = id_to_position;
        inner.id_to_metadata = payload.id_to_metadata;
        inner.deleted_ids = payload.deleted_ids;
        inner.next_id = payload.next_id;
        inner.dim = binary.dim;
        Ok(())
    }

    /// Load a previously [`Self::save`]d index, replaying the recorded
    /// vectors into a fresh backend of the recorded kind. On each startup,
    /// if the recorded deletion ratio exceeds `hard_rebuild_deletion_ratio`,
    /// rebuilds immediately rather than waiting for the next mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VectorStore`] if either file is missing,
    /// unreadable, or fails to deserialize.
    pub fn load(config: VectorIndexConfig) -> Result<Self, CoreError> {
        let index_path = &config.persistence_path;
        let binary_bytes = std::fs::read(index_path)?;
        let binary: IndexBinary = rmp_serde::from_slice(&binary_bytes)
            .map_err(|e| VectorError::Persistence(e.to_string()))?;
        let payload_bytes = std::fs::read(payload_path(index_path))?;
        let payload: PayloadSnapshot = rmp_serde::from_slice(&payload_bytes)
            .map_err(|e| VectorError::Persistence(e.to_string()))?;

        let training: Vec<Vec<f32>> = binary.vectors.iter().map(|(_, v)| v.clone()).collect();
        let mut backend = Backend::build(binary.kind, binary.dim, &training, binary.vectors.len(), &config);

        let mut id_to_position = HashMap::new();
        let mut position_to_id = Vec::new();
        for (id, vector) in &binary.vectors {
            let position = backend.add(vector).map_err(CoreError::from)?;
            if position >= position_to_id.len() {
                position_to_id.resize(position + 1, None);
            }
            position_to_id[position] = Some(id.clone());
            id_to_position.insert(id.clone(), position);
        }

        let hard_rebuild_deletion_ratio = config.hard_rebuild_deletion_ratio;
        let deleted_at_load = payload.deleted_ids.len();
        let total_at_load = position_to_id.len();
        let dim = binary.dim;

        let index = Self {
            config,
            inner: parking_lot::RwLock::new(IndexInner {
                backend,
                position_to_id,
                id_to_position,
                id_to_metadata: payload.id_to_metadata,
                deleted_ids: payload.deleted_ids,
                next_id: payload.next_id,
                dim,
            }),
        };

        if total_at_load > 0 {
            let ratio = deleted_at_load as f32 / total_at_load as f32;
            if ratio >= hard_rebuild_deletion_ratio {
                tracing::info!(ratio, "startup deletion ratio exceeds hard-rebuild threshold, rebuilding");
                index.rebuild(true);
            }
        }

        Ok(index)
    }
}

fn payload_path(index_path: &std::path::Path) -> std::path::PathBuf {
    let mut path = index_path.as_os_str().to_owned();
    path.push(".payload");
    std::path::PathBuf::from(path)
}

fn atomic_write(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, bytes)?;
    std::fs::rename(&temp_path, path)
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter().map(|x| x / norm).collect()
    } else {
        vector.to_vec()
    }
}

fn flatten_metadata(metadata: &MetadataRecord) -> HashMap<String, serde_json::Value> {
    match serde_json::to_value(metadata) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn reconstruct_vector(backend: &Backend, position: usize) -> Option<Vec<f32>> {
    backend.get_vector(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragcore_metadata::MetadataRecord;

    fn record(id: &str) -> MetadataRecord {
        MetadataRecord { vector_id: id.to_string(), doc_id: "doc".to_string(), text: "x".to_string(), ..Default::default() }
    }

    fn small_config() -> VectorIndexConfig {
        VectorIndexConfig { dimensions: 2, ..Default::default() }
    }

    #[test]
    fn add_and_search_round_trip() {
        let index = VectorIndex::new(small_config());
        index
            .add_vectors(vec![(vec![1.0, 0.0], record("a")), (vec![0.0, 1.0], record("b"))])
            .unwrap();
        let results = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let index = VectorIndex::new(small_config());
        let err = index.add_vectors(vec![(vec![1.0, 0.0, 0.0], record("a"))]);
        assert!(err.is_err());
    }

    #[test]
    fn deleted_vectors_are_excluded_from_search() {
        let index = VectorIndex::new(small_config());
        index
            .add_vectors(vec![(vec![1.0, 0.0], record("a")), (vec![0.9, 0.1], record("b"))])
            .unwrap();
        index.delete(&["a".to_string()]).unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert!(results.iter().all(|r| r.id != "a"));
    }
}
