use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmProvider};
use crate::retry::RetryPolicy;

/// Default chat model.
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiProvider {
    model: String,
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Builds a provider talking to `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client,
            retry,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };
        let mut attempt = 0usize;
        let resp = loop {
            match self.client.post(&self.endpoint).json(&body).send() {
                Ok(resp)
                    if self.retry.is_retryable_status(resp.status())
                        && self.retry.has_budget(attempt) =>
                {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        status = %resp.status(),
                        "retrying OpenAI request"
                    );
                    self.retry.wait(attempt);
                }
                Ok(resp) => break resp,
                Err(err) if self.retry.is_retryable_error(&err) && self.retry.has_budget(attempt) => {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        error = %err,
                        "retrying OpenAI request"
                    );
                    self.retry.wait(attempt);
                }
                Err(err) => return Err(err).context("failed to call OpenAI chat completions"),
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().context("failed to parse OpenAI response")?;
        Ok(parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
