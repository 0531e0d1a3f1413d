//! Shared value types for the data model.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An external artifact identified by an absolute source path.
///
/// A `Document` is never mutated in place; a change to the underlying file
/// produces a new `Document` with a new content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub source_path: String,
    /// SHA-256 of the raw bytes, used for deduplication.
    pub content_hash: String,
    pub source_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub tags: HashSet<String>,
}

/// A contiguous text span derived from exactly one [`Document`].
///
/// `(doc_id, chunk_index)` is the logical key and must be unique within a
/// document's chunk set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub chunk_size: usize,
    pub total_chunks: usize,
    pub chunking_method: String,
    /// Free-form flat attributes contributed by the processor that produced
    /// this chunk (e.g. page number, section heading).
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A fixed-dimension, unit-normalized embedding for exactly one [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vector {
    pub values: Vec<f32>,
}

impl Vector {
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        let mut v = Self { values };
        v.normalize();
        v
    }

    pub fn normalize(&mut self) {
        let norm = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut self.values {
                *x /= norm;
            }
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        self.values.iter().zip(other.values.iter()).map(|(a, b)| a * b).sum()
    }
}

/// Quality tag attached to a retrieved context segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTag {
    High,
    Medium,
    Low,
    Conflicted,
    Poisoned,
}

/// Conversational role of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Error,
}

/// A single turn's message, owned exclusively by the `ConversationState`
/// that contains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub confidence: f32,
    pub validated: bool,
    pub quality_score: f32,
    pub conflicts_with: Vec<String>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            confidence: 1.0,
            validated: false,
            quality_score: 1.0,
            conflicts_with: Vec::new(),
        }
    }
}
