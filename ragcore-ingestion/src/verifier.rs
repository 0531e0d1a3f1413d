//! Per-stage verification of the ingestion pipeline: every stage records
//! pass/warning/fail checks with a reason, rather than the pipeline only
//! surfacing a final success/failure boolean.

use ragcore_core::traits::ChunkedText;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    FileValidation,
    ProcessorSelection,
    ContentExtraction,
    TextChunking,
    EmbeddingGeneration,
    VectorStorage,
    MetadataStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
}

/// Outcome of one named check within a [`PipelineStage`].
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub stage: PipelineStage,
    pub check_name: &'static str,
    pub status: VerificationStatus,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: f64,
}

/// A stage-started/stage-completed/check-recorded event, delivered to every
/// registered callback as the pipeline runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerificationEvent {
    StageStarted { stage: PipelineStage },
    StageCompleted { stage: PipelineStage, duration_ms: f64 },
    CheckRecorded { result: VerificationResult },
}

type EventCallback = Arc<dyn Fn(&VerificationEvent) + Send + Sync>;

/// Runs the verification checks for each ingestion stage and accumulates
/// their results; callers inspect the returned `(passed, results)` pair or
/// subscribe to events for a live feed.
pub struct PipelineVerifier {
    save_intermediate: bool,
    results: parking_lot::Mutex<Vec<VerificationResult>>,
    stage_started_at: parking_lot::Mutex<HashMap<PipelineStage, Instant>>,
    callbacks: parking_lot::RwLock<Vec<EventCallback>>,
}

impl std::fmt::Debug for PipelineVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineVerifier").field("save_intermediate", &self.save_intermediate).finish_non_exhaustive()
    }
}

impl Default for PipelineVerifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PipelineVerifier {
    #[must_use]
    pub fn new(save_intermediate: bool) -> Self {
        Self {
            save_intermediate,
            results: parking_lot::Mutex::new(Vec::new()),
            stage_started_at: parking_lot::Mutex::new(HashMap::new()),
            callbacks: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn on_event(&self, callback: impl Fn(&VerificationEvent) + Send + Sync + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    fn emit(&self, event: VerificationEvent) {
        for callback in self.callbacks.read().iter() {
            callback(&event);
        }
    }

    fn start_stage(&self, stage: PipelineStage) {
        self.stage_started_at.lock().insert(stage, Instant::now());
        self.emit(VerificationEvent::StageStarted { stage });
    }

    fn end_stage(&self, stage: PipelineStage) {
        if let Some(started) = self.stage_started_at.lock().remove(&stage) {
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.emit(VerificationEvent::StageCompleted { stage, duration_ms });
        }
    }

    fn record(&self, result: VerificationResult) {
        tracing::debug!(stage = ?result.stage, check = result.check_name, status = ?result.status, "verification check");
        self.emit(VerificationEvent::CheckRecorded { result: result.clone() });
        if self.save_intermediate {
            self.results.lock().push(result);
        }
    }

    fn check(
        stage: PipelineStage,
        check_name: &'static str,
        status: VerificationStatus,
        message: impl Into<String>,
        details: serde_json::Map<String, serde_json::Value>,
        started: Instant,
    ) -> VerificationResult {
        VerificationResult {
            stage,
            check_name,
            status,
            message: message.into(),
            details,
            timestamp: chrono::Utc::now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Validate a file before it enters the pipeline: exists, non-empty,
    /// readable, and flag (but don't reject) an unrecognized extension or a
    /// file over 100MB.
    pub fn verify_file_input(&self, path: &std::path::Path) -> (bool, Vec<VerificationResult>) {
        self.start_stage(PipelineStage::FileValidation);
        let mut results = Vec::new();
        let stage = PipelineStage::FileValidation;

        let started = Instant::now();
        if !path.exists() {
            let result = Self::check(
                stage,
                "file_exists",
                VerificationStatus::Failed,
                format!("file not found: {}", path.display()),
                serde_json::Map::new(),
                started,
            );
            self.record(result.clone());
            results.push(result);
            self.end_stage(stage);
            return (false, results);
        }
        let exists_result = Self::check(stage, "file_exists", VerificationStatus::Passed, "file exists", serde_json::Map::new(), started);
        self.record(exists_result.clone());
        results.push(exists_result);

        let started = Instant::now();
        let metadata = std::fs::metadata(path);
        let size = metadata.as_ref().map(std::fs::Metadata::len).unwrap_or(0);
        let size_result = if size == 0 {
            Self::check(stage, "file_size", VerificationStatus::Failed, "file is empty", serde_json::Map::new(), started)
        } else if size > 100 * 1024 * 1024 {
            Self::check(
                stage,
                "file_size",
                VerificationStatus::Warning,
                format!("large file: {:.2}MB", size as f64 / 1024.0 / 1024.0),
                serde_json::Map::new(),
                started,
            )
        } else {
            Self::check(stage, "file_size", VerificationStatus::Passed, format!("file size: {:.2}KB", size as f64 / 1024.0), serde_json::Map::new(), started)
        };
        let size_failed = size_result.status == VerificationStatus::Failed;
        self.record(size_result.clone());
        results.push(size_result);
        if size_failed {
            self.end_stage(stage);
            return (false, results);
        }

        let started = Instant::now();
        let readable = std::fs::File::open(path).is_ok();
        let readable_result = if readable {
            Self::check(stage, "file_readable", VerificationStatus::Passed, "file is readable", serde_json::Map::new(), started)
        } else {
            Self::check(stage, "file_readable", VerificationStatus::Failed, "cannot read file", serde_json::Map::new(), started)
        };
        let readable_failed = readable_result.status == VerificationStatus::Failed;
        self.record(readable_result.clone());
        results.push(readable_result);
        if readable_failed {
            self.end_stage(stage);
            return (false, results);
        }

        let started = Instant::now();
        const SUPPORTED: &[&str] = &["pdf", "docx", "xlsx", "txt", "md", "csv"];
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).unwrap_or_default();
        let extension_result = if SUPPORTED.contains(&extension.as_str()) {
            Self::check(stage, "file_extension", VerificationStatus::Passed, format!("supported extension: {extension}"), serde_json::Map::new(), started)
        } else {
            Self::check(stage, "file_extension", VerificationStatus::Warning, format!("unusual extension: {extension}"), serde_json::Map::new(), started)
        };
        self.record(extension_result.clone());
        results.push(extension_result);

        self.end_stage(stage);
        (results.iter().all(|r| r.status != VerificationStatus::Failed), results)
    }

    /// Verify chunk quality: non-empty, not too many empty or oversized
    /// (>2000 chars) chunks, and most chunks carry metadata.
    #[must_use]
    pub fn verify_chunks(&self, chunks: &[ChunkedText]) -> (bool, Vec<VerificationResult>) {
        let stage = PipelineStage::TextChunking;
        self.start_stage(stage);
        let mut results = Vec::new();

        let started = Instant::now();
        if chunks.is_empty() {
            let result = Self::check(stage, "chunks_exist", VerificationStatus::Failed, "no chunks produced", serde_json::Map::new(), started);
            self.record(result.clone());
            self.end_stage(stage);
            return (false, vec![result]);
        }
        let exists_result = Self::check(stage, "chunks_exist", VerificationStatus::Passed, format!("found {} chunks", chunks.len()), serde_json::Map::new(), started);
        self.record(exists_result.clone());
        results.push(exists_result);

        let started = Instant::now();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        let empty = sizes.iter().filter(|&&s| s == 0).count();
        let oversized = sizes.iter().filter(|&&s| s > 2000).count();
        let size_result = if empty > 0 {
            Self::check(stage, "chunk_sizes", VerificationStatus::Warning, format!("found {empty} empty chunks"), serde_json::Map::new(), started)
        } else if oversized > 0 {
            Self::check(stage, "chunk_sizes", VerificationStatus::Warning, format!("found {oversized} oversized chunks (>2000 chars)"), serde_json::Map::new(), started)
        } else {
            let avg = sizes.iter().sum::<usize>() as f64 / sizes.len() as f64;
            Self::check(stage, "chunk_sizes", VerificationStatus::Passed, format!("chunk sizes are appropriate (avg: {avg:.0} chars)"), serde_json::Map::new(), started)
        };
        self.record(size_result.clone());
        results.push(size_result);

        let started = Instant::now();
        let with_metadata = chunks.iter().filter(|c| !c.metadata.is_empty()).count();
        #[allow(clippy::cast_precision_loss)]
        let metadata_result = if (with_metadata as f64) < chunks.len() as f64 * 0.5 {
            Self::check(
                stage,
                "chunk_metadata",
                VerificationStatus::Warning,
                format!("only {with_metadata}/{} chunks have metadata", chunks.len()),
                serde_json::Map::new(),
                started,
            )
        } else {
            Self::check(
                stage,
                "chunk_metadata",
                VerificationStatus::Passed,
                format!("most chunks have metadata ({with_metadata}/{})", chunks.len()),
                serde_json::Map::new(),
                started,
            )
        };
        self.record(metadata_result.clone());
        results.push(metadata_result);

        self.end_stage(stage);
        (results.iter().all(|r| r.status != VerificationStatus::Failed), results)
    }

    /// Verify embeddings: non-empty, every vector the same dimension, and
    /// (if `expected_dim` is given) matching the configured embedder.
    #[must_use]
    pub fn verify_embeddings(&self, embeddings: &[Vec<f32>], expected_dim: Option<usize>) -> (bool, Vec<VerificationResult>) {
        let stage = PipelineStage::EmbeddingGeneration;
        self.start_stage(stage);
        let mut results = Vec::new();

        let started = Instant::now();
        if embeddings.is_empty() {
            let result = Self::check(stage, "embeddings_exist", VerificationStatus::Failed, "no embeddings produced", serde_json::Map::new(), started);
            self.record(result.clone());
            self.end_stage(stage);
            return (false, vec![result]);
        }
        let exists_result = Self::check(stage, "embeddings_exist", VerificationStatus::Passed, format!("found {} embeddings", embeddings.len()), serde_json::Map::new(), started);
        self.record(exists_result.clone());
        results.push(exists_result);

        let started = Instant::now();
        let first_dim = embeddings[0].len();
        let consistent = embeddings.iter().all(|e| e.len() == first_dim);
        let dim_matches_expected = expected_dim.map_or(true, |dim| dim == first_dim);
        let dim_result = if !consistent {
            Self::check(stage, "embedding_dimensions", VerificationStatus::Failed, "embeddings have inconsistent dimensions", serde_json::Map::new(), started)
        } else if !dim_matches_expected {
            Self::check(
                stage,
                "embedding_dimensions",
                VerificationStatus::Failed,
                format!("expected dimension {}, got {first_dim}", expected_dim.unwrap_or(0)),
                serde_json::Map::new(),
                started,
            )
        } else {
            Self::check(stage, "embedding_dimensions", VerificationStatus::Passed, format!("dimension {first_dim} consistent across all embeddings"), serde_json::Map::new(), started)
        };
        let dim_failed = dim_result.status == VerificationStatus::Failed;
        self.record(dim_result.clone());
        results.push(dim_result);
        if dim_failed {
            self.end_stage(stage);
            return (false, results);
        }

        let started = Instant::now();
        let zero_vectors = embeddings.iter().filter(|e| e.iter().all(|x| *x == 0.0)).count();
        let zero_result = if zero_vectors > 0 {
            Self::check(stage, "embedding_values", VerificationStatus::Warning, format!("found {zero_vectors} all-zero embeddings"), serde_json::Map::new(), started)
        } else {
            Self::check(stage, "embedding_values", VerificationStatus::Passed, "no degenerate embeddings", serde_json::Map::new(), started)
        };
        self.record(zero_result.clone());
        results.push(zero_result);

        self.end_stage(stage);
        (results.iter().all(|r| r.status != VerificationStatus::Failed), results)
    }

    /// Verify the vector store accepted as many vectors as were submitted.
    #[must_use]
    pub fn verify_vector_storage(&self, submitted: usize, stored: usize) -> (bool, Vec<VerificationResult>) {
        let stage = PipelineStage::VectorStorage;
        self.start_stage(stage);
        let started = Instant::now();
        let result = if stored == submitted {
            Self::check(stage, "vector_count", VerificationStatus::Passed, format!("stored all {stored} vectors"), serde_json::Map::new(), started)
        } else {
            Self::check(stage, "vector_count", VerificationStatus::Failed, format!("submitted {submitted} vectors but stored {stored}"), serde_json::Map::new(), started)
        };
        self.record(result.clone());
        self.end_stage(stage);
        (result.status != VerificationStatus::Failed, vec![result])
    }

    /// Verify the metadata store accepted as many records as vectors.
    #[must_use]
    pub fn verify_metadata_storage(&self, vector_count: usize, metadata_count: usize) -> (bool, Vec<VerificationResult>) {
        let stage = PipelineStage::MetadataStorage;
        self.start_stage(stage);
        let started = Instant::now();
        let result = if vector_count == metadata_count {
            Self::check(stage, "metadata_count", VerificationStatus::Passed, format!("stored metadata for all {metadata_count} records"), serde_json::Map::new(), started)
        } else {
            Self::check(
                stage,
                "metadata_count",
                VerificationStatus::Failed,
                format!("{vector_count} vectors but {metadata_count} metadata records"),
                serde_json::Map::new(),
                started,
            )
        };
        self.record(result.clone());
        self.end_stage(stage);
        (result.status != VerificationStatus::Failed, vec![result])
    }

    #[must_use]
    pub fn results(&self) -> Vec<VerificationResult> {
        self.results.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_file() {
        let verifier = PipelineVerifier::new(true);
        let (passed, results) = verifier.verify_file_input(std::path::Path::new("/no/such/file.txt"));
        assert!(!passed);
        assert_eq!(results[0].check_name, "file_exists");
    }

    #[test]
    fn rejects_empty_chunk_set() {
        let verifier = PipelineVerifier::new(true);
        let (passed, _) = verifier.verify_chunks(&[]);
        assert!(!passed);
    }

    #[test]
    fn flags_inconsistent_embedding_dimensions() {
        let verifier = PipelineVerifier::new(true);
        let (passed, _) = verifier.verify_embeddings(&[vec![0.1, 0.2], vec![0.1, 0.2, 0.3]], None);
        assert!(!passed);
    }

    #[test]
    fn accepts_matching_vector_and_metadata_counts() {
        let verifier = PipelineVerifier::new(true);
        let (passed, _) = verifier.verify_vector_storage(10, 10);
        assert!(passed);
        let (passed, _) = verifier.verify_metadata_storage(10, 10);
        assert!(passed);
    }
}
