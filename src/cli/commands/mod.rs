mod ask;
mod chat;
mod config;
mod index;
mod status;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use index::IndexArgs;

pub use ask::handle_ask;
pub use chat::handle_chat;
pub use config::handle_config;
pub use index::handle_index;
pub use status::handle_status;

use std::sync::Arc;

use crate::error::AppError;
use crate::models::Config;
use crate::services::{
    BatchEmbedder, ChatEngine, GeminiChatClient, GeminiEmbeddingClient, VectorStore,
    create_backend,
};

/// Open the configured vector store.
async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>, AppError> {
    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension)).await?;
    Ok(Arc::from(store))
}

/// Batch embedder backed by the hosted provider. Fails fast without a key.
fn build_embedder(config: &Config) -> Result<BatchEmbedder, AppError> {
    let api_key = config.require_api_key()?;
    let client = GeminiEmbeddingClient::new(&config.api, api_key, &config.embedding)
        .map_err(|e| AppError::Other(e.to_string()))?;
    Ok(BatchEmbedder::new(
        Arc::new(client),
        config.embedding.batch_size as usize,
    ))
}

fn build_engine(
    config: &Config,
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
) -> Result<ChatEngine, AppError> {
    let api_key = config.require_api_key()?;
    let model = GeminiChatClient::new(&config.api, api_key, &config.chat)?;
    Ok(ChatEngine::new(embedder, store, Arc::new(model), &config.chat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::models::VectorDriver;

    #[test]
    fn test_build_embedder_requires_key() {
        let config = Config::default();
        let err = build_embedder(&config).err().unwrap();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_build_engine_requires_key() {
        let mut config = Config::default();
        config.api.key = Some("   ".to_string());
        let embedder = {
            let mut with_key = config.clone();
            with_key.api.key = Some("test-key".to_string());
            build_embedder(&with_key).unwrap()
        };
        let store: Arc<dyn VectorStore> =
            Arc::new(crate::services::LocalBackend::new(&config.vector_store, 768));
        assert!(build_engine(&config, embedder, store).is_err());
    }

    #[tokio::test]
    async fn test_open_store_uses_configured_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.vector_store.path = dir.path().to_path_buf();
        config.embedding.dimension = 3;

        let store = open_store(&config).await.unwrap();
        assert_eq!(store.driver(), VectorDriver::Local);
        store.create_collection().await.unwrap();

        let page = crate::models::PageText {
            source: "docs/a.pdf".to_string(),
            page: 1,
            text: "text".to_string(),
        };
        let mut chunk = crate::models::DocumentChunk::from_page(&page, "text".to_string(), 0);
        chunk.dense_vector = vec![0.1, 0.2];
        assert!(store.upsert_points(vec![chunk]).await.is_err());
    }
}
