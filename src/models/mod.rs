mod chat;
mod config;
mod document;
mod search;

pub use chat::{ChatMessage, ChatTurn, Citation, Role};
pub use config::{
    ApiConfig, ChatConfig, Config, ConfigSource, DEFAULT_BATCH_SIZE, DEFAULT_CHAT_MODEL,
    DEFAULT_CHAT_TIMEOUT_SECS, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_QDRANT_URL, DEFAULT_SCAN_LIMIT, DEFAULT_TOP_K,
    ENV_OVERRIDES, EmbeddingConfig, IndexingConfig, LoggingConfig, OutputConfig, ResolvedConfig,
    VectorDriver, VectorStoreConfig,
};
pub use document::{ChunkMetadata, DocumentChunk, PageText, document_id_from_source};
pub use search::{OutputFormat, RetrievedRecord};
