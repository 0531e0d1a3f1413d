//! Ingestion pipeline and folder-watch configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub method: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            method: "sliding_window".to_string(),
        }
    }
}

impl ChunkingConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunking.chunk_size must be non-zero".into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err("chunking.chunk_overlap must be smaller than chunk_size".into());
        }
        Ok(())
    }
}

/// Folder watcher polling and concurrency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FolderWatchConfig {
    pub watch_paths: Vec<std::path::PathBuf>,
    /// Seconds between re-scans.
    pub poll_interval_secs: u64,
    /// Maximum files processed concurrently.
    pub max_concurrent_processors: usize,
    pub supported_extensions: Vec<String>,
}

impl Default for FolderWatchConfig {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            poll_interval_secs: 30,
            max_concurrent_processors: 3,
            supported_extensions: vec![
                "txt".to_string(),
                "md".to_string(),
                "markdown".to_string(),
            ],
        }
    }
}

impl FolderWatchConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("folder_watch.poll_interval_secs must be non-zero".into());
        }
        if self.max_concurrent_processors == 0 {
            return Err("folder_watch.max_concurrent_processors must be non-zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_are_valid() {
        ChunkingConfig::default().validate().unwrap();
        FolderWatchConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_overlap_ge_chunk_size() {
        let mut cfg = ChunkingConfig::default();
        cfg.chunk_overlap = cfg.chunk_size;
        assert!(cfg.validate().is_err());
    }
}
