//! Chat model abstraction and the Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::gemini::{GeminiHttp, model_resource};
use crate::error::ChatError;
use crate::models::{ApiConfig, ChatConfig, ChatMessage, Role};

/// A hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Answer `question` given a system instruction and prior turns.
    async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ChatError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

fn text_content(role: Option<&str>, text: impl Into<String>) -> Content<'_> {
    Content {
        role,
        parts: vec![Part { text: text.into() }],
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Human => "user",
        Role::Ai => "model",
    }
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiChatClient {
    http: GeminiHttp,
    model: String,
    temperature: f64,
}

impl GeminiChatClient {
    pub fn new(api: &ApiConfig, api_key: &str, config: &ChatConfig) -> Result<Self, ChatError> {
        let http = GeminiHttp::new(
            &api.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            http,
            model: model_resource(&config.model),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiChatClient {
    async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ChatError> {
        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|m| text_content(Some(role_name(m.role)), m.content.as_str()))
            .collect();
        contents.push(text_content(Some("user"), question));

        let request = GenerateContentRequest {
            system_instruction: text_content(None, system),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response: GenerateContentResponse = self
            .http
            .call(&self.model, "generateContent", &request)
            .await?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(ChatError::MalformedResponse(format!(
                "model returned no answer: {reason}"
            )));
        };

        let answer: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(ChatError::MalformedResponse(format!(
                "empty answer (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
