//! Metadata manager configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Current schema version stamped into every new record as
    /// `_schema_version`; used to detect records needing migration.
    pub schema_version: u32,
    pub persistence_path: std::path::PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            schema_version: 2,
            persistence_path: std::path::PathBuf::from("data/metadata"),
        }
    }
}

impl MetadataConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version == 0 {
            return Err("metadata.schema_version must be non-zero".into());
        }
        Ok(())
    }
}
