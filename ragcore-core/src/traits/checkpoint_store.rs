//! Durable storage for per-thread conversation state.
//!
//! Generic over the checkpointed state type so that `ragcore-core` does not
//! need to depend on `ragcore-conversation`'s `ConversationState`.

use crate::error::CoreError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// At-least-once durable store for conversation checkpoints, keyed by
/// `thread_id`. Overwrites are idempotent.
#[async_trait]
pub trait CheckpointStore<S>: Send + Sync
where
    S: Serialize + DeserializeOwned + Send + Sync,
{
    /// Fetch the checkpoint for `thread_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] on a storage-layer failure (a
    /// missing thread is `Ok(None)`, not an error).
    async fn get(&self, thread_id: &str) -> Result<Option<S>, CoreError>;

    /// Persist `state` as the checkpoint for `thread_id`, replacing any
    /// prior value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] on a storage-layer failure.
    async fn put(&self, thread_id: &str, state: &S) -> Result<(), CoreError>;

    /// Remove the checkpoint for `thread_id`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] on a storage-layer failure.
    async fn delete(&self, thread_id: &str) -> Result<(), CoreError>;

    /// List all known thread ids.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] on a storage-layer failure.
    async fn list(&self) -> Result<Vec<String>, CoreError>;
}
