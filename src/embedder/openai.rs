//! OpenAI-compatible embedding client.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::EmbeddingBackend;
use crate::retry::RetryPolicy;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Connection settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// Bearer token for the API.
    pub api_key: String,
    /// Base URL such as `https://api.openai.com/v1`.
    pub base_url: String,
    /// Embedding model identifier.
    pub model: String,
    /// Optional output dimensionality override.
    pub dimensions: Option<usize>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry behavior for rate limits and transient errors.
    pub retry: RetryPolicy,
}

/// Blocking embeddings client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// Builds a client, validating the key and model.
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!config.model.trim().is_empty(), "missing embedding model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid embedding API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            dimensions: config.dimensions,
            retry: config.retry,
        })
    }

    /// Model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_once(&self, input: &str) -> Result<Vec<f32>, Attempt> {
        let request = EmbeddingRequest {
            model: &self.model,
            input,
            dimensions: self.dimensions,
        };
        let resp = match self.client.post(&self.endpoint).json(&request).send() {
            Ok(resp) => resp,
            Err(err) => {
                let retryable = self.retry.is_retryable_error(&err);
                return Err(Attempt::new(anyhow::Error::new(err), retryable));
            }
        };
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Attempt::new(
                anyhow::anyhow!("embedding request failed ({status}): {body}"),
                self.retry.is_retryable_status(status),
            ));
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .context("failed to parse embedding response")
            .map_err(|err| Attempt::new(err, false))?;
        parsed
            .data
            .into_iter()
            .min_by_key(|entry| entry.index)
            .map(|entry| entry.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| Attempt::new(anyhow::anyhow!("embedding response was empty"), false))
    }
}

impl EmbeddingBackend for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0usize;
        loop {
            match self.request_once(text) {
                Ok(embedding) => return Ok(embedding),
                Err(failure) if failure.retryable && self.retry.has_budget(attempt) => {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        error = %failure.error,
                        "retrying embedding request"
                    );
                    self.retry.wait(attempt);
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

struct Attempt {
    error: anyhow::Error,
    retryable: bool,
}

impl Attempt {
    fn new(error: anyhow::Error, retryable: bool) -> Self {
        Self { error, retryable }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str, model: &str) -> OpenAiEmbedderConfig {
        OpenAiEmbedderConfig {
            api_key: api_key.to_string(),
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            model: model.to_string(),
            dimensions: None,
            timeout: Duration::from_secs(1),
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn rejects_blank_key_and_model() {
        assert!(OpenAiEmbedder::new(config("  ", DEFAULT_EMBEDDING_MODEL)).is_err());
        assert!(OpenAiEmbedder::new(config("sk-test", "")).is_err());
    }

    #[test]
    fn endpoint_drops_trailing_slash() {
        let embedder = OpenAiEmbedder::new(config("sk-test", DEFAULT_EMBEDDING_MODEL))
            .expect("valid config");
        assert_eq!(embedder.endpoint, "http://127.0.0.1:9/v1/embeddings");
        assert_eq!(embedder.model(), DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn serializes_request_without_absent_dimensions() {
        let request = EmbeddingRequest {
            model: "m",
            input: "hello",
            dimensions: None,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json, serde_json::json!({ "model": "m", "input": "hello" }));
    }
}
