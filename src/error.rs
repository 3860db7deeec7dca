//! Error types for docchat.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classification of a provider failure, assigned where the failure originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rate limit or quota exhaustion (HTTP 429, `RESOURCE_EXHAUSTED`).
    QuotaExceeded,
    /// The request did not complete in time.
    Timeout,
    /// Vector count mismatch or a response body of unexpected shape.
    MalformedResponse,
    /// Generic network or provider failure.
    Transport,
    /// Missing or rejected credential.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::QuotaExceeded => "quota exceeded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::Transport => "transport error",
            ErrorKind::Configuration => "configuration error",
        };
        f.write_str(name)
    }
}

/// A failed call against the hosted provider, already classified.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("invalid embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding request failed: {0}")]
    Transport(String),

    #[error("embedding configuration error: {0}")]
    Configuration(String),
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            EmbeddingError::Timeout => ErrorKind::Timeout,
            EmbeddingError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            EmbeddingError::Transport(_) => ErrorKind::Transport,
            EmbeddingError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl From<ProviderError> for EmbeddingError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            ErrorKind::QuotaExceeded => EmbeddingError::QuotaExceeded(err.message),
            ErrorKind::Timeout => EmbeddingError::Timeout,
            ErrorKind::MalformedResponse => EmbeddingError::MalformedResponse(err.message),
            ErrorKind::Transport => EmbeddingError::Transport(err.message),
            ErrorKind::Configuration => EmbeddingError::Configuration(err.message),
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("metadata listing error: {0}")]
    ListError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("store file error: {0}")]
    StorageError(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found. Set it in the environment or in a .env file")]
    MissingCredential(String),
}

/// Errors related to reading source documents.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to read PDF {path}: {message}")]
    PdfError { path: String, message: String },

    #[error("documents directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("directory walk error: {0}")]
    WalkError(String),
}

/// Errors related to building the vector store from documents.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("no documents to index")]
    NoDocuments,

    /// Every chunk failed to embed; the existing store was left untouched.
    #[error("none of the {chunks} chunk(s) could be embedded; existing vector store kept")]
    NothingEmbedded { chunks: usize },
}

/// Errors produced while generating a chat response.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The HTTP client gave up before the provider answered.
    #[error("chat request timed out: {0}")]
    RequestTimeout(String),

    #[error("chat quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid chat response: {0}")]
    MalformedResponse(String),

    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("chat configuration error: {0}")]
    Configuration(String),

    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to retrieve context: {0}")]
    VectorStore(#[from] VectorStoreError),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Timeout(_) | ChatError::RequestTimeout(_) => ErrorKind::Timeout,
            ChatError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            ChatError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ChatError::Transport(_) | ChatError::VectorStore(_) => ErrorKind::Transport,
            ChatError::Configuration(_) => ErrorKind::Configuration,
            ChatError::Embedding(e) => e.kind(),
        }
    }

    /// Render the message shown to the user in the conversation.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::QuotaExceeded => "Quota limit reached. The provider rejected the request \
                because the API quota is exhausted. Wait for the quota to reset (free tier \
                quotas reset daily) or upgrade your plan, then ask again. Your documents are \
                already indexed."
                .to_string(),
            ErrorKind::Timeout => "Request timed out. The model did not answer in time, which \
                usually means the API is slow or the quota is nearly exhausted. Wait a moment \
                and try again."
                .to_string(),
            _ => format!("Error generating response: {self}"),
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            ErrorKind::QuotaExceeded => ChatError::QuotaExceeded(err.message),
            ErrorKind::Timeout => ChatError::RequestTimeout(err.message),
            ErrorKind::MalformedResponse => ChatError::MalformedResponse(err.message),
            ErrorKind::Transport => ChatError::Transport(err.message),
            ErrorKind::Configuration => ChatError::Configuration(err.message),
        }
    }
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("{0}")]
    Other(String),
}
