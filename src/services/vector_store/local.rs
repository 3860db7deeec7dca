//! File-backed vector store.
//!
//! One JSON file per collection at `<path>/<collection>.json`. The whole
//! collection is held in memory after the first access and written back with
//! a temp-file rename after every mutation. Search is an exhaustive cosine
//! scan, which is fine for the few thousand chunks a document folder yields.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{
    ChunkMetadata, DocumentChunk, RetrievedRecord, VectorDriver, VectorStoreConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    document_id: String,
    chunk_index: u32,
    content: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
    created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    dimension: u64,
    records: Vec<StoredRecord>,
}

#[derive(Debug, Default)]
struct State {
    loaded: bool,
    /// None while the collection does not exist.
    collection: Option<CollectionFile>,
}

pub struct LocalBackend {
    file_path: PathBuf,
    collection: String,
    embedding_dim: u64,
    state: Mutex<State>,
}

impl LocalBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Self {
        Self {
            file_path: config.path.join(format!("{}.json", config.collection)),
            collection: config.collection.clone(),
            embedding_dim,
            state: Mutex::new(State::default()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn state(&self) -> Result<MutexGuard<'_, State>, VectorStoreError> {
        let mut state = self.state.lock().await;
        if !state.loaded {
            state.collection = read_collection(&self.file_path).await?;
            state.loaded = true;
        }
        Ok(state)
    }

    async fn persist(&self, collection: &CollectionFile) -> Result<(), VectorStoreError> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VectorStoreError::StorageError(e.to_string()))?;
        }

        let json = serde_json::to_vec(collection)
            .map_err(|e| VectorStoreError::StorageError(e.to_string()))?;
        let tmp_path = self.file_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| VectorStoreError::StorageError(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &self.file_path)
            .await
            .map_err(|e| VectorStoreError::StorageError(e.to_string()))?;

        debug!(
            path = %self.file_path.display(),
            records = collection.records.len(),
            "persisted collection"
        );
        Ok(())
    }
}

async fn read_collection(path: &Path) -> Result<Option<CollectionFile>, VectorStoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VectorStoreError::StorageError(e.to_string())),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| VectorStoreError::StorageError(format!("{}: {}", path.display(), e)))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for LocalBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.state().await.map(|_| true)
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let state = self.state().await?;
        Ok(state.collection.as_ref().map(|c| CollectionInfo {
            points_count: c.records.len() as u64,
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        let mut state = self.state().await?;
        if state.collection.is_some() {
            return Ok(());
        }

        let collection = CollectionFile {
            dimension: self.embedding_dim,
            records: Vec::new(),
        };
        self.persist(&collection).await?;
        state.collection = Some(collection);
        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut state = self.state().await?;
        let Some(collection) = state.collection.as_mut() else {
            return Err(VectorStoreError::CollectionError(format!(
                "collection '{}' does not exist",
                self.collection
            )));
        };

        for chunk in &chunks {
            if chunk.dense_vector.len() as u64 != collection.dimension {
                return Err(VectorStoreError::UpsertError(format!(
                    "chunk {} has {} dimensions, collection expects {}",
                    chunk.id,
                    chunk.dense_vector.len(),
                    collection.dimension
                )));
            }
        }

        let mut positions: HashMap<String, usize> = collection
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        for chunk in chunks {
            let record = StoredRecord {
                id: chunk.id,
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                metadata: chunk.metadata,
                vector: chunk.dense_vector,
                created_at: chunk.created_at,
            };
            match positions.get(&record.id) {
                Some(&i) => collection.records[i] = record,
                None => {
                    positions.insert(record.id.clone(), collection.records.len());
                    collection.records.push(record);
                }
            }
        }

        self.persist(collection).await
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
        let state = self.state().await?;
        let Some(collection) = state.collection.as_ref() else {
            return Ok(Vec::new());
        };

        if query_vector.len() as u64 != collection.dimension {
            return Err(VectorStoreError::SearchError(format!(
                "query has {} dimensions, collection expects {}",
                query_vector.len(),
                collection.dimension
            )));
        }

        let mut scored: Vec<(f32, &StoredRecord)> = collection
            .records
            .iter()
            .map(|r| (cosine_similarity(&query_vector, &r.vector), r))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(score, r)| RetrievedRecord {
                id: r.id.clone(),
                score,
                content: r.content.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn list_metadata(&self, limit: usize) -> Result<Vec<ChunkMetadata>, VectorStoreError> {
        let state = self.state().await?;
        Ok(state
            .collection
            .as_ref()
            .map(|c| {
                c.records
                    .iter()
                    .take(limit)
                    .map(|r| r.metadata.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clear_collection(&self) -> Result<(), VectorStoreError> {
        let mut state = self.state().await?;
        if state.collection.is_none() {
            return Ok(());
        }

        let collection = CollectionFile {
            dimension: self.embedding_dim,
            records: Vec::new(),
        };
        self.persist(&collection).await?;
        state.collection = Some(collection);
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Local
    }
}
