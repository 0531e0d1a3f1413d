//! Shared error taxonomy, data-model value types and external-collaborator
//! traits for the RAG core workspace.

pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
