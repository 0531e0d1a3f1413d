//! Vector-index-local errors, converted to [`ragcore_core::CoreError`] at
//! the crate boundary.

use ragcore_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector id not found: {0}")]
    NotFound(String),

    #[error("invalid k: {0} (must be > 0)")]
    InvalidK(usize),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<VectorError> for CoreError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { .. } | VectorError::InvalidK(_) => {
                CoreError::InvalidParameter { message: err.to_string() }
            }
            VectorError::NotFound(_) => CoreError::NotFound { message: err.to_string() },
            VectorError::Persistence(_) | VectorError::Io(_) => {
                CoreError::VectorStore { message: err.to_string() }
            }
        }
    }
}
