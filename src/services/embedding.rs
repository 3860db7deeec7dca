//! Embedding provider abstraction and the Gemini implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::gemini::{GeminiHttp, model_resource};
use crate::error::EmbeddingError;
use crate::models::{ApiConfig, EmbeddingConfig};

/// Task-type hint sent with each embedding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Indexed content
    RetrievalDocument,
    /// Search input
    RetrievalQuery,
}

/// A hosted embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed all `texts` in one request; one vector per text, in order.
    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text in one request.
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

/// Client for the Gemini `embedContent` / `batchEmbedContents` endpoints.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    http: GeminiHttp,
    model: String,
}

impl GeminiEmbeddingClient {
    pub fn new(
        api: &ApiConfig,
        api_key: &str,
        config: &EmbeddingConfig,
    ) -> Result<Self, EmbeddingError> {
        let http = GeminiHttp::new(
            &api.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            http,
            model: model_resource(&config.model),
        })
    }

    fn request<'a>(&'a self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingClient {
    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| self.request(text, task_type))
                .collect(),
        };

        let response: BatchEmbedResponse = self
            .http
            .call(&self.model, "batchEmbedContents", &request)
            .await?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, EmbeddingError> {
        let request = self.request(text, task_type);

        let response: EmbedContentResponse = self
            .http
            .call(&self.model, "embedContent", &request)
            .await?;

        Ok(response.embedding.values)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
