//! Concrete [`CheckpointStore`] implementations for conversation state:
//! an in-process map for tests and single-instance deployments, and a
//! per-thread JSON file store for durability across restarts.

use async_trait::async_trait;
use parking_lot::RwLock;
use ragcore_core::error::CoreError;
use ragcore_core::traits::CheckpointStore;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, bytes)?;
    std::fs::rename(&temp_path, path)
}

/// Thread-safe, in-process checkpoint store. State does not survive a
/// process restart; suitable for tests and single-instance deployments
/// that don't need durability.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore<S> {
    states: RwLock<HashMap<String, S>>,
}

impl<S> InMemoryCheckpointStore<S> {
    #[must_use]
    pub fn new() -> Self {
        Self { states: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl<S> CheckpointStore<S> for InMemoryCheckpointStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + Clone + 'static,
{
    async fn get(&self, thread_id: &str) -> Result<Option<S>, CoreError> {
        Ok(self.states.read().get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, state: &S) -> Result<(), CoreError> {
        self.states.write().insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CoreError> {
        self.states.write().remove(thread_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.states.read().keys().cloned().collect())
    }
}

/// Durable checkpoint store persisting each thread's state as one JSON
/// file under `directory`, written with the same temp-file-then-rename
/// discipline the vector index uses so a reader never observes a partial
/// write.
#[derive(Debug)]
pub struct FileCheckpointStore<S> {
    directory: PathBuf,
    _marker: PhantomData<fn() -> S>,
}

impl<S> FileCheckpointStore<S> {
    /// # Errors
    ///
    /// Returns [`CoreError::Conversation`] if `directory` cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| CoreError::Conversation { message: format!("failed to create checkpoint directory: {e}") })?;
        Ok(Self { directory, _marker: PhantomData })
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.directory.join(format!("{thread_id}.json"))
    }
}

#[async_trait]
impl<S> CheckpointStore<S> for FileCheckpointStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, thread_id: &str) -> Result<Option<S>, CoreError> {
        let path = self.path_for(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| CoreError::Conversation { message: format!("failed to read checkpoint {thread_id}: {e}") })?;
        let state = serde_json::from_slice(&bytes).map_err(|e| CoreError::Conversation { message: format!("failed to deserialize checkpoint {thread_id}: {e}") })?;
        Ok(Some(state))
    }

    async fn put(&self, thread_id: &str, state: &S) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| CoreError::Conversation { message: format!("failed to serialize checkpoint {thread_id}: {e}") })?;
        atomic_write(&self.path_for(thread_id), &bytes).map_err(|e| CoreError::Conversation { message: format!("failed to write checkpoint {thread_id}: {e}") })?;
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CoreError> {
        let path = self.path_for(thread_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| CoreError::Conversation { message: format!("failed to delete checkpoint {thread_id}: {e}") })?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CoreError> {
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.directory).map_err(|e| CoreError::Conversation { message: format!("failed to list checkpoints: {e}") })?;
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::Conversation { message: format!("failed to list checkpoints: {e}") })?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryCheckpointStore::<ConversationState>::new();
        let state = ConversationState::new(Some("thread-1".to_string()));
        store.put("thread-1", &state).await.unwrap();
        let loaded = store.get("thread-1").await.unwrap();
        assert_eq!(loaded.unwrap().conversation_id, state.conversation_id);
    }

    #[tokio::test]
    async fn file_store_round_trips_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::<ConversationState>::new(dir.path()).unwrap();
        let state = ConversationState::new(Some("thread-2".to_string()));
        store.put("thread-2", &state).await.unwrap();
        let loaded = store.get("thread-2").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, state.session_id);
        assert_eq!(store.list().await.unwrap(), vec!["thread-2".to_string()]);
        store.delete("thread-2").await.unwrap();
        assert!(store.get("thread-2").await.unwrap().is_none());
    }
}
