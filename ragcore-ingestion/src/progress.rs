//! Per-file progress tracking across ingestion stages, with a weighted
//! overall-progress estimate and callbacks for progress/completion/error
//! events — independent of [`crate::verifier::PipelineVerifier`], which
//! checks correctness rather than tracking completion percentage.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Queued,
    Validating,
    Extracting,
    Chunking,
    Embedding,
    Storing,
    Indexing,
    Finalizing,
}

impl ProgressStage {
    const ALL: [Self; 8] =
        [Self::Queued, Self::Validating, Self::Extracting, Self::Chunking, Self::Embedding, Self::Storing, Self::Indexing, Self::Finalizing];

    /// Share of overall progress this stage contributes when complete.
    /// Mirrors the weighting a file's ingestion time is actually spent on:
    /// embedding dominates, queueing and indexing are nearly free.
    const fn weight(self) -> f64 {
        match self {
            Self::Queued => 0.05,
            Self::Validating => 0.10,
            Self::Extracting => 0.20,
            Self::Chunking => 0.15,
            Self::Embedding => 0.25,
            Self::Storing => 0.15,
            Self::Indexing => 0.05,
            Self::Finalizing => 0.05,
        }
    }
}

#[derive(Debug, Clone)]
struct StageInfo {
    status: ProgressStatus,
    /// Fractional completion within this stage, `0.0..=1.0`.
    progress: f64,
}

impl Default for StageInfo {
    fn default() -> Self {
        Self { status: ProgressStatus::Pending, progress: 0.0 }
    }
}

/// Progress for one file moving through the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct FileProgress {
    pub file_path: String,
    pub file_size: u64,
    pub status: ProgressStatus,
    pub current_stage: ProgressStage,
    stages: HashMap<ProgressStage, StageInfo>,
    started_at: Instant,
    pub error: Option<String>,
    pub chunks_created: usize,
    pub vectors_created: usize,
}

impl FileProgress {
    fn new(file_path: String, file_size: u64) -> Self {
        Self {
            file_path,
            file_size,
            status: ProgressStatus::Pending,
            current_stage: ProgressStage::Queued,
            stages: ProgressStage::ALL.iter().map(|&s| (s, StageInfo::default())).collect(),
            started_at: Instant::now(),
            error: None,
            chunks_created: 0,
            vectors_created: 0,
        }
    }

    /// Weighted completion across every stage; `1.0` once `status` is
    /// `Completed` regardless of individual stage bookkeeping.
    #[must_use]
    pub fn overall_progress(&self) -> f64 {
        if self.status == ProgressStatus::Completed {
            return 1.0;
        }
        let total: f64 = ProgressStage::ALL
            .iter()
            .map(|stage| {
                let info = &self.stages[stage];
                match info.status {
                    ProgressStatus::Completed => stage.weight(),
                    ProgressStatus::Running => stage.weight() * info.progress,
                    _ => 0.0,
                }
            })
            .sum();
        total.min(1.0)
    }

    #[must_use]
    pub fn estimated_time_remaining(&self) -> Option<std::time::Duration> {
        let progress = self.overall_progress();
        if progress <= 0.0 {
            return None;
        }
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let total_estimated = elapsed / progress;
        Some(std::time::Duration::from_secs_f64((total_estimated - elapsed).max(0.0)))
    }
}

type ProgressCallback = Arc<dyn Fn(&str, &FileProgress) + Send + Sync>;

/// Tracks [`FileProgress`] for every in-flight file, keyed by path.
pub struct ProgressTracker {
    files: parking_lot::RwLock<HashMap<String, FileProgress>>,
    progress_callbacks: parking_lot::RwLock<Vec<ProgressCallback>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker").finish_non_exhaustive()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { files: parking_lot::RwLock::new(HashMap::new()), progress_callbacks: parking_lot::RwLock::new(Vec::new()) }
    }

    pub fn on_progress(&self, callback: impl Fn(&str, &FileProgress) + Send + Sync + 'static) {
        self.progress_callbacks.write().push(Arc::new(callback));
    }

    fn notify(&self, path: &str) {
        let files = self.files.read();
        if let Some(progress) = files.get(path) {
            for callback in self.progress_callbacks.read().iter() {
                callback(path, progress);
            }
        }
    }

    pub fn start_file(&self, file_path: impl Into<String>, file_size: u64) {
        let file_path = file_path.into();
        let mut progress = FileProgress::new(file_path.clone(), file_size);
        progress.status = ProgressStatus::Running;
        self.files.write().insert(file_path.clone(), progress);
        self.notify(&file_path);
    }

    pub fn update_stage(&self, file_path: &str, stage: ProgressStage, progress_fraction: f64) {
        {
            let mut files = self.files.write();
            if let Some(file) = files.get_mut(file_path) {
                file.current_stage = stage;
                let info = file.stages.entry(stage).or_default();
                info.status = ProgressStatus::Running;
                info.progress = progress_fraction.clamp(0.0, 1.0);
            }
        }
        self.notify(file_path);
    }

    pub fn complete_stage(&self, file_path: &str, stage: ProgressStage) {
        {
            let mut files = self.files.write();
            if let Some(file) = files.get_mut(file_path) {
                let info = file.stages.entry(stage).or_default();
                info.status = ProgressStatus::Completed;
                info.progress = 1.0;
            }
        }
        self.notify(file_path);
    }

    pub fn complete_file(&self, file_path: &str, chunks_created: usize, vectors_created: usize) {
        {
            let mut files = self.files.write();
            if let Some(file) = files.get_mut(file_path) {
                file.status = ProgressStatus::Completed;
                file.chunks_created = chunks_created;
                file.vectors_created = vectors_created;
            }
        }
        self.notify(file_path);
    }

    pub fn fail_file(&self, file_path: &str, error: impl Into<String>) {
        {
            let mut files = self.files.write();
            if let Some(file) = files.get_mut(file_path) {
                file.status = ProgressStatus::Failed;
                file.error = Some(error.into());
            }
        }
        self.notify(file_path);
    }

    #[must_use]
    pub fn get(&self, file_path: &str) -> Option<FileProgress> {
        self.files.read().get(file_path).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<FileProgress> {
        self.files.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_progress_weights_completed_stages() {
        let tracker = ProgressTracker::new();
        tracker.start_file("a.txt", 100);
        tracker.complete_stage("a.txt", ProgressStage::Queued);
        tracker.complete_stage("a.txt", ProgressStage::Validating);
        let progress = tracker.get("a.txt").unwrap();
        assert!((progress.overall_progress() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn completed_file_reports_full_progress() {
        let tracker = ProgressTracker::new();
        tracker.start_file("a.txt", 100);
        tracker.complete_file("a.txt", 3, 3);
        assert_eq!(tracker.get("a.txt").unwrap().overall_progress(), 1.0);
    }
}
