//! `FolderWatcher`: re-scans configured directories on a fixed interval and
//! feeds changed files into an [`IngestionEngine`], bounding concurrent
//! processing with a semaphore.
//!
//! Polling instead of OS file-event notification is a deliberate choice: a
//! fixed re-scan interval is simple to reason about across network
//! filesystems and editors that replace-on-save (which looks like a
//! delete+create to an event watcher), at the cost of up to one interval's
//! worth of latency.

use crate::engine::IngestionEngine;
use ragcore_config::FolderWatchConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileState {
    size: u64,
    modified: Option<SystemTime>,
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ScanResult {
    #[must_use]
    pub fn changed(&self) -> Vec<PathBuf> {
        self.added.iter().chain(self.modified.iter()).cloned().collect()
    }
}

pub struct FolderWatcher {
    config: FolderWatchConfig,
    engine: Arc<IngestionEngine>,
    known: parking_lot::Mutex<HashMap<PathBuf, FileState>>,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher").field("config", &self.config).finish_non_exhaustive()
    }
}

impl FolderWatcher {
    #[must_use]
    pub fn new(config: FolderWatchConfig, engine: Arc<IngestionEngine>) -> Self {
        Self { config, engine, known: parking_lot::Mutex::new(HashMap::new()) }
    }

    fn is_supported(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| self.config.supported_extensions.iter().any(|s| s == &ext))
    }

    /// Walk every configured watch path and diff against the previously
    /// recorded `(size, mtime)` state, without mutating that state —
    /// callers decide when a scan's results are "committed" via
    /// [`Self::commit_scan`].
    #[must_use]
    pub fn scan(&self) -> ScanResult {
        let mut current: HashMap<PathBuf, FileState> = HashMap::new();
        for root in &self.config.watch_paths {
            for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() || !self.is_supported(entry.path()) {
                    continue;
                }
                let Ok(metadata) = entry.metadata() else { continue };
                current.insert(
                    entry.path().to_path_buf(),
                    FileState { size: metadata.len(), modified: metadata.modified().ok() },
                );
            }
        }

        let known = self.known.lock();
        let mut result = ScanResult::default();
        for (path, state) in &current {
            match known.get(path) {
                None => result.added.push(path.clone()),
                Some(previous) if previous != state => result.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        for path in known.keys() {
            if !current.contains_key(path) {
                result.removed.push(path.clone());
            }
        }
        result
    }

    pub fn commit_scan(&self, current_states: impl IntoIterator<Item = (PathBuf, (u64, Option<SystemTime>))>) {
        let mut known = self.known.lock();
        known.clear();
        for (path, (size, modified)) in current_states {
            known.insert(path, FileState { size, modified });
        }
    }

    /// Run one scan-and-ingest pass: diff the filesystem, then ingest every
    /// added/modified file with at most `max_concurrent_processors`
    /// in flight at once.
    pub async fn run_once(&self) -> ScanResult {
        let scan = self.scan();
        let changed = scan.changed();

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_concurrent_processors));
        let mut handles = Vec::with_capacity(changed.len());
        for path in changed {
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else { return };
                if let Err(error) = engine.ingest_file(&path, None).await {
                    tracing::error!(path = %path.display(), %error, "folder watcher ingest failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let mut states = Vec::new();
        for root in &self.config.watch_paths {
            for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() || !self.is_supported(entry.path()) {
                    continue;
                }
                if let Ok(metadata) = entry.metadata() {
                    states.push((entry.path().to_path_buf(), (metadata.len(), metadata.modified().ok())));
                }
            }
        }
        self.commit_scan(states);

        scan
    }

    /// Run [`Self::run_once`] on a `poll_interval_secs` timer until the
    /// returned handle is dropped or aborted.
    pub fn spawn_polling_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval_secs = self.config.poll_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                let result = self.run_once().await;
                if !result.added.is_empty() || !result.modified.is_empty() || !result.removed.is_empty() {
                    tracing::info!(
                        added = result.added.len(),
                        modified = result.modified.len(),
                        removed = result.removed.len(),
                        "folder watcher scan found changes"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_result_combines_added_and_modified() {
        let result = ScanResult {
            added: vec![PathBuf::from("a.txt")],
            modified: vec![PathBuf::from("b.txt")],
            removed: vec![PathBuf::from("c.txt")],
        };
        let changed = result.changed();
        assert_eq!(changed.len(), 2);
        assert!(changed.contains(&PathBuf::from("a.txt")));
        assert!(changed.contains(&PathBuf::from("b.txt")));
    }
}
