//! Configuration structs for every RAG core subsystem.
//!
//! Each section mirrors the conventions of `ragcore-config`'s sibling
//! crates: `#[serde(default)]` structs with hand-written `Default` impls
//! and a `validate()` returning a plain `String` description of the first
//! problem found, so the caller can decide how to surface it (log vs.
//! abort startup).

pub mod conversation;
pub mod ingestion;
pub mod metadata;
pub mod vector;

pub use conversation::{ContextConfig, ConversationConfig};
pub use ingestion::{ChunkingConfig, FolderWatchConfig};
pub use metadata::MetadataConfig;
pub use vector::{HnswConfig, IvfConfig, PqConfig, VectorIndexConfig};

use serde::{Deserialize, Serialize};

/// Top-level configuration aggregating every subsystem's settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RagCoreConfig {
    pub vector_index: VectorIndexConfig,
    pub chunking: ChunkingConfig,
    pub folder_watch: FolderWatchConfig,
    pub metadata: MetadataConfig,
    pub conversation: ConversationConfig,
}

impl RagCoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field absent from the file (via `#[serde(default)]`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Self::validate`].
    pub fn load(path: &std::path::Path) -> Result<Self, ragcore_core::CoreError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            ragcore_core::CoreError::InvalidParameter {
                message: format!("invalid configuration at {}: {e}", path.display()),
            }
        })?;
        config
            .validate()
            .map_err(|message| ragcore_core::CoreError::InvalidParameter { message })?;
        Ok(config)
    }

    /// Run every subsystem's `validate()` in turn.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn validate(&self) -> Result<(), String> {
        self.vector_index.validate()?;
        self.chunking.validate()?;
        self.folder_watch.validate()?;
        self.metadata.validate()?;
        self.conversation.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_aggregate_config_is_valid() {
        RagCoreConfig::default().validate().unwrap();
    }

    #[test]
    fn load_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = RagCoreConfig::default();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = RagCoreConfig::load(&path).unwrap();
        assert_eq!(loaded.vector_index.dimensions, config.vector_index.dimensions);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();
        assert!(RagCoreConfig::load(&path).is_err());
    }
}
