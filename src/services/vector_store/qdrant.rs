//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PayloadIncludeSelector, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use std::collections::HashMap;

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{
    ChunkMetadata, DocumentChunk, RetrievedRecord, VectorDriver, VectorStoreConfig,
};

const SCROLL_PAGE_SIZE: u32 = 256;

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }
}

fn chunk_payload(chunk: DocumentChunk) -> (String, Vec<f32>, HashMap<String, Value>) {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("document_id".to_string(), chunk.document_id.into());
    payload.insert(
        "chunk_index".to_string(),
        i64::from(chunk.chunk_index).into(),
    );
    payload.insert("content".to_string(), chunk.content.into());
    payload.insert("source".to_string(), chunk.metadata.source.into());
    payload.insert("page".to_string(), i64::from(chunk.metadata.page).into());
    payload.insert("created_at".to_string(), chunk.created_at.into());

    (chunk.id, chunk.dense_vector, payload)
}

fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    })
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(n)) => u32::try_from(*n).ok(),
        Some(Kind::DoubleValue(n)) => Some(*n as u32),
        _ => None,
    })
}

/// Records written by other tools may lack a source; those yield None.
fn payload_metadata(payload: &HashMap<String, Value>) -> Option<ChunkMetadata> {
    let source = payload_str(payload, "source")?;
    Some(ChunkMetadata {
        source: source.to_string(),
        page: payload_u32(payload, "page").unwrap_or(0),
    })
}

fn point_id_string(id: Option<&PointId>) -> String {
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.get_collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let (id, vector, payload) = chunk_payload(chunk);
                PointStruct::new(id, vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
        let search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let records = results
            .result
            .into_iter()
            .filter_map(|point| {
                let metadata = payload_metadata(&point.payload)?;
                Some(RetrievedRecord {
                    id: point_id_string(point.id.as_ref()),
                    score: point.score,
                    content: payload_str(&point.payload, "content")
                        .unwrap_or_default()
                        .to_string(),
                    metadata,
                })
            })
            .collect();

        Ok(records)
    }

    async fn list_metadata(&self, limit: usize) -> Result<Vec<ChunkMetadata>, VectorStoreError> {
        if self.get_collection_info().await?.is_none() {
            return Ok(Vec::new());
        }

        let mut metadata = Vec::new();
        let mut offset: Option<PointId> = None;

        while metadata.len() < limit {
            let remaining = u32::try_from(limit - metadata.len()).unwrap_or(u32::MAX);
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(remaining.min(SCROLL_PAGE_SIZE))
                .with_payload(PayloadIncludeSelector {
                    fields: vec!["source".to_string(), "page".to_string()],
                })
                .with_vectors(false);

            if let Some(off) = offset {
                scroll_builder = scroll_builder.offset(off);
            }

            let response = self
                .client
                .scroll(scroll_builder)
                .await
                .map_err(|e| VectorStoreError::ListError(e.to_string()))?;

            if response.result.is_empty() {
                break;
            }

            metadata.extend(
                response
                    .result
                    .iter()
                    .filter_map(|point| payload_metadata(&point.payload)),
            );

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        metadata.truncate(limit);
        Ok(metadata)
    }

    async fn clear_collection(&self) -> Result<(), VectorStoreError> {
        if self.get_collection_info().await?.is_none() {
            return Ok(());
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        self.create_collection().await?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }
}
