//! Vector store abstraction layer.
//!
//! Backends are selected by configuration: a JSON file on local disk (the
//! default, no server required) or a Qdrant collection.

mod local;
mod qdrant;

pub use local::LocalBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{ChunkMetadata, DocumentChunk, RetrievedRecord, VectorDriver, VectorStoreConfig};

/// Collection information
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Operations every vector store backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Returns None if the collection doesn't exist.
    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection if it doesn't exist.
    async fn create_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace chunks by ID. Every chunk must carry a vector.
    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError>;

    /// Nearest records to `query_vector`, best match first.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError>;

    /// Metadata of up to `limit` stored records, in storage order.
    async fn list_metadata(&self, limit: usize) -> Result<Vec<ChunkMetadata>, VectorStoreError>;

    /// Remove every record, leaving an empty collection behind.
    async fn clear_collection(&self) -> Result<(), VectorStoreError>;

    fn collection(&self) -> &str;

    fn driver(&self) -> VectorDriver;
}

/// Create the backend named by `config.driver`.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Local => {
            let backend = LocalBackend::new(config, embedding_dim);
            Ok(Box::new(backend))
        }
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, embedding_dim)?;
            Ok(Box::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_backend_follows_driver() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            path: dir.path().to_path_buf(),
            collection: "manuals".to_string(),
            ..Default::default()
        };

        let backend = create_backend(&config, 768).await.unwrap();
        assert_eq!(backend.driver(), VectorDriver::Local);
        assert_eq!(backend.collection(), "manuals");

        let config = VectorStoreConfig {
            driver: VectorDriver::Qdrant,
            ..Default::default()
        };
        let backend = create_backend(&config, 768).await.unwrap();
        assert_eq!(backend.driver(), VectorDriver::Qdrant);
    }
}
