//! Shared error taxonomy for the RAG core.
//!
//! `CoreError` is the top-level enum every crate in the workspace converts
//! into at its public boundary. Narrower, crate-local error enums (e.g. a
//! metadata-specific or vector-index-specific enum) may exist upstream of
//! this one and implement `From<LocalError> for CoreError`.

use thiserror::Error;

/// Errors surfaced by any RAG core subsystem.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("resource error: {message}")]
    Resource { message: String },

    #[error("operation timed out: {message}")]
    Timeout { message: String },

    #[error("dependency unavailable: {message}")]
    Dependency { message: String },

    #[error("vector store error: {message}")]
    VectorStore { message: String },

    #[error("ingestion error for {path}: {message}")]
    Ingestion { path: String, message: String },

    #[error("chunking error: {message}")]
    Chunking { message: String },

    #[error("embedding error: {message}")]
    Embedding { message: String },

    #[error("metadata error: {message}")]
    Metadata { message: String },

    #[error("conversation error: {message}")]
    Conversation { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Abstract error kind, used for the `{code, message}` envelope at the
    /// external boundary (see the error handling design).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotFound { .. } => "not_found",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Resource { .. } => "resource_error",
            Self::Timeout { .. } => "timeout",
            Self::Dependency { .. } => "dependency_error",
            Self::VectorStore { .. } => "vector_store_error",
            Self::Ingestion { .. } => "ingestion_error",
            Self::Chunking { .. } => "chunking_error",
            Self::Embedding { .. } => "embedding_error",
            Self::Metadata { .. } => "metadata_error",
            Self::Conversation { .. } => "conversation_error",
            Self::Io(_) | Self::Json(_) => "resource_error",
        }
    }

    /// Whether the caller should retry this failure with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Dependency { .. })
    }
}

/// Convenience `Result` alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_dependency_are_retryable() {
        assert!(CoreError::Timeout { message: "x".into() }.is_retryable());
        assert!(CoreError::Dependency { message: "x".into() }.is_retryable());
        assert!(!CoreError::NotFound { message: "x".into() }.is_retryable());
    }

    #[test]
    fn kind_matches_taxonomy() {
        assert_eq!(CoreError::Metadata { message: "x".into() }.kind(), "metadata_error");
        assert_eq!(
            CoreError::Ingestion { path: "p".into(), message: "x".into() }.kind(),
            "ingestion_error"
        );
    }
}
