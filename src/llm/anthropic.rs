use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmProvider};
use crate::retry::RetryPolicy;

/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client.
pub struct AnthropicProvider {
    model: String,
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

impl AnthropicProvider {
    /// Builds a provider talking to `base_url` (e.g. `https://api.anthropic.com/v1`).
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Anthropic API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            model,
            endpoint: format!("{}/messages", base_url.trim_end_matches('/')),
            client,
            retry,
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: &request.prompt,
                }],
            }],
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
                        "retrying Anthropic request"
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
                        "retrying Anthropic request"
                    );
                    self.retry.wait(attempt);
                }
                Err(err) => return Err(err).context("failed to call Anthropic messages API"),
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Anthropic returned {}: {}", status, text);
        }
        let parsed: AnthropicResponse =
            resp.json().context("failed to parse Anthropic response")?;
        Ok(collect_text(parsed))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

fn collect_text(response: AnthropicResponse) -> String {
    response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::Text { text } => Some(text),
            AnthropicResponseBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"one"},{"type":"tool_use","id":"x"},{"type":"text","text":"two"}]}"#,
        )
        .expect("parse");
        assert_eq!(collect_text(response), "one\ntwo");
    }
}
