//! `IngestionEngine`: processes one file end to end — extract, chunk,
//! embed, merge metadata, store — verifying each stage as it goes and
//! reporting progress.

use crate::progress::{ProgressStage, ProgressTracker};
use crate::verifier::PipelineVerifier;
use ragcore_config::ChunkingConfig;
use ragcore_core::error::CoreError;
use ragcore_core::traits::{Chunker, Embedder, FileProcessorRegistry};
use ragcore_metadata::MetadataManager;
use ragcore_vector::VectorStorage;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a file was actually stored or skipped short of storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Success,
    Skipped,
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub status: IngestionStatus,
    pub doc_id: String,
    pub chunks: usize,
    pub vectors: usize,
    /// Whether this ingest replaced a prior version of the same document.
    pub is_update: bool,
    /// How many of the prior version's vectors were deleted before restore.
    pub old_vectors_deleted: usize,
    /// Set on a `Skipped` report: `"duplicate"`, `"no_content"` or `"no_chunks"`.
    pub reason: Option<String>,
    /// Set when `reason` is `"duplicate"`: the `doc_id` already holding this content.
    pub duplicate_file_id: Option<String>,
}

impl IngestionReport {
    fn skipped(reason: &str, duplicate_file_id: Option<String>) -> Self {
        Self {
            status: IngestionStatus::Skipped,
            doc_id: String::new(),
            chunks: 0,
            vectors: 0,
            is_update: false,
            old_vectors_deleted: 0,
            reason: Some(reason.to_string()),
            duplicate_file_id,
        }
    }
}

/// Ties a file processor registry, chunker, embedder, vector store and
/// metadata manager into one verified ingest-a-file operation.
pub struct IngestionEngine {
    processors: Arc<FileProcessorRegistry>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    storage: Arc<dyn VectorStorage>,
    metadata: Arc<MetadataManager>,
    chunking: ChunkingConfig,
    verifier: Arc<PipelineVerifier>,
    progress: Arc<ProgressTracker>,
    /// Content hash (sha256 hex) -> `doc_id` of the file that first ingested
    /// it, so a byte-identical re-ingest short-circuits as a duplicate
    /// rather than re-embedding and re-storing. In-memory only: this table
    /// does not survive a process restart, so a duplicate re-submitted
    /// after a restart is re-ingested rather than skipped.
    content_hashes: parking_lot::RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionEngine").finish_non_exhaustive()
    }
}

impl IngestionEngine {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        processors: Arc<FileProcessorRegistry>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        storage: Arc<dyn VectorStorage>,
        metadata: Arc<MetadataManager>,
        chunking: ChunkingConfig,
        verifier: Arc<PipelineVerifier>,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            processors,
            chunker,
            embedder,
            storage,
            metadata,
            chunking,
            verifier,
            progress,
            content_hashes: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Ingest one file: dedup -> update-detect -> extract -> chunk -> embed
    /// -> merge metadata -> store, verifying each stage and reporting
    /// progress throughout.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Ingestion`] if file validation fails, or
    /// propagates the first hard failure from extraction, chunking,
    /// embedding or storage.
    pub async fn ingest_file(&self, path: &std::path::Path, overrides: Option<Map<String, Value>>) -> Result<IngestionReport, CoreError> {
        let path_str = path.display().to_string();
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.progress.start_file(path_str.clone(), file_size);

        let (passed, results) = self.verifier.verify_file_input(path);
        if !passed {
            self.progress.fail_file(&path_str, "file validation failed");
            let reasons: Vec<String> = results.into_iter().map(|r| r.message).collect();
            return Err(CoreError::Ingestion { path: path_str, message: reasons.join("; ") });
        }
        self.progress.complete_stage(&path_str, ProgressStage::Validating);

        let content_hash = {
            let bytes = std::fs::read(path)?;
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        };
        if let Some(duplicate_of) = self.content_hashes.read().get(&content_hash).cloned() {
            self.progress.complete_file(&path_str, 0, 0);
            return Ok(IngestionReport::skipped("duplicate", Some(duplicate_of)));
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
        let doc_path = overrides.as_ref().and_then(|o| o.get("doc_path")).and_then(Value::as_str);
        let filename = overrides
            .as_ref()
            .and_then(|o| o.get("filename"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| file_name.clone());
        let file_path = overrides
            .as_ref()
            .and_then(|o| o.get("file_path"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| path_str.clone());

        let prior_ids = self.storage.find_by_path_identity(doc_path, filename.as_deref(), Some(file_path.as_str())).await?;
        let (is_update, canonical_doc_id) = if prior_ids.is_empty() {
            (false, None)
        } else {
            let canonical_doc_id = self.storage.get_metadata(&prior_ids[0]).await?.map(|r| r.doc_id);
            self.storage.delete(&prior_ids).await?;
            (true, canonical_doc_id)
        };
        let old_vectors_deleted = prior_ids.len();

        self.progress.update_stage(&path_str, ProgressStage::Extracting, 0.0);
        let processor = self.processors.resolve(path);
        let processor_overrides = overrides.clone().map(|m| m.into_iter().collect());
        let processed = processor.process(path, processor_overrides).await.map_err(|e| {
            self.progress.fail_file(&path_str, e.to_string());
            e
        })?;
        self.progress.complete_stage(&path_str, ProgressStage::Extracting);

        let has_content = match (&processed.chunks, &processed.text) {
            (Some(chunks), _) => !chunks.is_empty(),
            (None, Some(text)) => !text.trim().is_empty(),
            (None, None) => false,
        };
        if !has_content {
            self.progress.complete_file(&path_str, 0, 0);
            return Ok(IngestionReport::skipped("no_content", None));
        }

        self.progress.update_stage(&path_str, ProgressStage::Chunking, 0.0);
        let chunked = if let Some(chunks) = processed.chunks {
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, (text, metadata))| ragcore_core::traits::ChunkedText { text, chunk_index: i, metadata })
                .collect()
        } else {
            let text = processed.text.unwrap_or_default();
            self.chunker.chunk_text(&text, Some(&processed.metadata)).await?
        };

        if chunked.is_empty() {
            self.progress.complete_file(&path_str, 0, 0);
            return Ok(IngestionReport::skipped("no_chunks", None));
        }

        let (chunks_ok, chunk_results) = self.verifier.verify_chunks(&chunked);
        if !chunks_ok {
            self.progress.fail_file(&path_str, "chunk verification failed");
            let reasons: Vec<String> = chunk_results.into_iter().map(|r| r.message).collect();
            return Err(CoreError::Chunking { message: reasons.join("; ") });
        }
        self.progress.complete_stage(&path_str, ProgressStage::Chunking);

        self.progress.update_stage(&path_str, ProgressStage::Embedding, 0.0);
        let texts: Vec<String> = chunked.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_texts(&texts).await?;
        let (embeddings_ok, embedding_results) = self.verifier.verify_embeddings(&embeddings, Some(self.embedder.dimension()));
        if !embeddings_ok {
            self.progress.fail_file(&path_str, "embedding verification failed");
            let reasons: Vec<String> = embedding_results.into_iter().map(|r| r.message).collect();
            return Err(CoreError::Embedding { message: reasons.join("; ") });
        }
        self.progress.complete_stage(&path_str, ProgressStage::Embedding);

        self.progress.update_stage(&path_str, ProgressStage::Storing, 0.0);
        let total_chunks = chunked.len();
        let mut file_metadata = Map::new();
        if let Some(doc_id) = &canonical_doc_id {
            file_metadata.insert("doc_id".to_string(), Value::String(doc_id.clone()));
        }
        if let Some(filename) = &filename {
            file_metadata.insert("filename".to_string(), Value::String(filename.clone()));
        }
        file_metadata.insert("file_path".to_string(), Value::String(file_path));

        let mut items = Vec::with_capacity(chunked.len());
        let mut doc_id = String::new();
        for (chunk, embedding) in chunked.into_iter().zip(embeddings.into_iter()) {
            let mut chunk_fields = chunk.metadata;
            chunk_fields.insert("text".to_string(), Value::String(chunk.text));
            chunk_fields.insert("chunk_index".to_string(), Value::from(chunk.chunk_index));
            chunk_fields.insert("chunk_size".to_string(), Value::from(chunk_fields.get("text").and_then(Value::as_str).map(str::len).unwrap_or(0)));
            chunk_fields.insert("total_chunks".to_string(), Value::from(total_chunks));
            chunk_fields.insert("embedding_model".to_string(), Value::String(self.embedder.model_name().to_string()));

            let mut sources = vec![file_metadata.clone(), processed.metadata.clone().into_iter().collect()];
            if let Some(overrides) = &overrides {
                sources.push(overrides.clone());
            }
            sources.push(chunk_fields.into_iter().collect());

            let record = self.metadata.merge_metadata(&sources, true)?;
            doc_id = record.doc_id.clone();
            items.push((embedding, record));
        }

        let vector_ids = self.storage.insert(items).await?;
        let (storage_ok, storage_results) = self.verifier.verify_vector_storage(total_chunks, vector_ids.len());
        if !storage_ok {
            self.progress.fail_file(&path_str, "vector storage verification failed");
            let reasons: Vec<String> = storage_results.into_iter().map(|r| r.message).collect();
            return Err(CoreError::VectorStore { message: reasons.join("; ") });
        }
        let (metadata_ok, metadata_results) = self.verifier.verify_metadata_storage(total_chunks, vector_ids.len());
        if !metadata_ok {
            self.progress.fail_file(&path_str, "metadata storage verification failed");
            let reasons: Vec<String> = metadata_results.into_iter().map(|r| r.message).collect();
            return Err(CoreError::Metadata { message: reasons.join("; ") });
        }
        self.progress.complete_stage(&path_str, ProgressStage::Storing);
        self.progress.complete_stage(&path_str, ProgressStage::Indexing);
        self.progress.complete_stage(&path_str, ProgressStage::Finalizing);
        self.progress.complete_file(&path_str, total_chunks, vector_ids.len());

        self.content_hashes.write().insert(content_hash, doc_id.clone());

        Ok(IngestionReport {
            status: IngestionStatus::Success,
            doc_id,
            chunks: total_chunks,
            vectors: vector_ids.len(),
            is_update,
            old_vectors_deleted,
            reason: None,
            duplicate_file_id: None,
        })
    }

    #[must_use]
    pub fn chunking_config(&self) -> &ChunkingConfig {
        &self.chunking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragcore_config::MetadataConfig;
    use ragcore_core::traits::{ChunkedText, FileProcessor, ProcessedFile};
    use ragcore_vector::VectorIndex;

    struct FixedTextProcessor(parking_lot::Mutex<String>);

    #[async_trait]
    impl FileProcessor for FixedTextProcessor {
        fn extensions(&self) -> &[&str] {
            &["txt"]
        }

        async fn process(&self, _path: &std::path::Path, _metadata: Option<HashMap<String, Value>>) -> Result<ProcessedFile, CoreError> {
            Ok(ProcessedFile { text: Some(self.0.lock().clone()), chunks: None, metadata: HashMap::new() })
        }
    }

    struct WholeTextChunker;

    #[async_trait]
    impl Chunker for WholeTextChunker {
        async fn chunk_text(&self, text: &str, _metadata: Option<&HashMap<String, Value>>) -> Result<Vec<ChunkedText>, CoreError> {
            if text.is_empty() {
                Ok(vec![])
            } else {
                Ok(vec![ChunkedText { text: text.to_string(), chunk_index: 0, metadata: HashMap::new() }])
            }
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed-test"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    fn engine(text: &str) -> (Arc<FixedTextProcessor>, IngestionEngine) {
        let processor = Arc::new(FixedTextProcessor(parking_lot::Mutex::new(text.to_string())));
        let processors = Arc::new(FileProcessorRegistry::new(processor.clone()));
        let config = ragcore_config::VectorIndexConfig { dimensions: 4, ..Default::default() };
        let storage = Arc::new(VectorIndex::new(config));
        let engine = IngestionEngine::new(
            processors,
            Arc::new(WholeTextChunker),
            Arc::new(FixedEmbedder),
            storage,
            Arc::new(MetadataManager::new(MetadataConfig::default())),
            ChunkingConfig::default(),
            Arc::new(PipelineVerifier::new(false)),
            Arc::new(ProgressTracker::new()),
        );
        (processor, engine)
    }

    #[tokio::test]
    async fn second_ingest_of_identical_bytes_is_skipped_as_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "incident report").unwrap();
        let (_processor, engine) = engine("incident report");

        let first = engine.ingest_file(&path, None).await.unwrap();
        assert_eq!(first.status, IngestionStatus::Success);

        let second = engine.ingest_file(&path, None).await.unwrap();
        assert_eq!(second.status, IngestionStatus::Skipped);
        assert_eq!(second.reason.as_deref(), Some("duplicate"));
        assert_eq!(second.duplicate_file_id.as_deref(), Some(first.doc_id.as_str()));
    }

    #[tokio::test]
    async fn reingesting_changed_content_at_the_same_path_rebinds_the_old_doc_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "version one").unwrap();
        let (processor, engine) = engine("version one");

        let first = engine.ingest_file(&path, None).await.unwrap();
        assert!(!first.is_update);

        *processor.0.lock() = "version two".to_string();
        std::fs::write(&path, "version two").unwrap();
        let second = engine.ingest_file(&path, None).await.unwrap();

        assert!(second.is_update);
        assert_eq!(second.old_vectors_deleted, first.vectors);
        assert_eq!(second.doc_id, first.doc_id);
    }

    #[tokio::test]
    async fn empty_file_is_skipped_as_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "   ").unwrap();
        let (_processor, engine) = engine("   ");

        let report = engine.ingest_file(&path, None).await.unwrap();
        assert_eq!(report.status, IngestionStatus::Skipped);
        assert_eq!(report.reason.as_deref(), Some("no_content"));
    }
}
