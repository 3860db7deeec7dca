mod batch;
mod chat;
mod chunker;
mod embedding;
mod gemini;
mod llm;
mod prepare;
mod reconcile;
mod vector_store;

pub use batch::{BatchEmbedder, DEFAULT_BATCH_SIZE};
pub use chat::{ChatEngine, ChatSession, SYSTEM_PROMPT, TurnOutcome, build_system_prompt};
pub use chunker::TextChunker;
pub use embedding::{EmbeddingProvider, GeminiEmbeddingClient, TaskType};
pub use llm::{ChatModel, GeminiChatClient};
pub use prepare::{CorpusIndexer, IndexStats, PrepareOutcome};
pub use reconcile::{CorpusReconciler, Reconciliation};
pub use vector_store::{
    CollectionInfo, LocalBackend, QdrantBackend, VectorStore, create_backend,
};
