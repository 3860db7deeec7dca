//! Shared HTTP plumbing for the Gemini REST API.
//!
//! Every failure is classified into an [`ErrorKind`] here, where the HTTP
//! status and the provider's error status are still available.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ProviderError};

const API_VERSION: &str = "v1beta";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Authenticated JSON client for one Gemini endpoint base.
#[derive(Debug, Clone)]
pub struct GeminiHttp {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiHttp {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::new(
                ErrorKind::Configuration,
                "missing API key",
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::new(ErrorKind::Transport, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base}/v1beta/{resource}:{method}` and decode the JSON reply.
    pub async fn call<Req, Resp>(
        &self,
        resource: &str,
        method: &str,
        body: &Req,
    ) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}/{}:{}", self.base_url, API_VERSION, resource, method);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(classify_request_error)?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::new(
                ErrorKind::MalformedResponse,
                format!("unexpected response from {method}: {e}"),
            )
        })
    }
}

/// Normalize a model identifier to the `models/<name>` resource form.
pub fn model_resource(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn classify_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(ErrorKind::Timeout, err.to_string())
    } else if err.is_decode() {
        ProviderError::new(ErrorKind::MalformedResponse, err.to_string())
    } else {
        ProviderError::new(ErrorKind::Transport, err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let (provider_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), body.trim().to_string()),
    };

    let kind = if status == StatusCode::TOO_MANY_REQUESTS || provider_status == "RESOURCE_EXHAUSTED"
    {
        ErrorKind::QuotaExceeded
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || provider_status == "UNAUTHENTICATED"
        || provider_status == "PERMISSION_DENIED"
    {
        ErrorKind::Configuration
    } else if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::GATEWAY_TIMEOUT
        || provider_status == "DEADLINE_EXCEEDED"
    {
        ErrorKind::Timeout
    } else {
        ErrorKind::Transport
    };

    ProviderError::new(kind, format!("status {}: {}", status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_resource() {
        assert_eq!(
            model_resource("text-embedding-004"),
            "models/text-embedding-004"
        );
        assert_eq!(
            model_resource("models/text-embedding-004"),
            "models/text-embedding-004"
        );
    }

    #[test]
    fn test_classify_status() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);

        let body = r#"{"error":{"code":400,"message":"Quota exceeded for metric","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
        assert!(err.message.contains("Quota exceeded for metric"));

        let err = classify_status(StatusCode::FORBIDDEN, "denied");
        assert_eq!(err.kind, ErrorKind::Configuration);

        let err = classify_status(StatusCode::GATEWAY_TIMEOUT, "");
        assert_eq!(err.kind, ErrorKind::Timeout);

        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert_eq!(err.kind, ErrorKind::Transport);
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = GeminiHttp::new("http://localhost", "  ", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
