//! Chat-completion providers.

use anyhow::Result;

mod anthropic;
mod openai;

pub use anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_MODEL};
pub use openai::{OpenAiProvider, DEFAULT_OPENAI_CHAT_MODEL};

/// Trait implemented by concrete completion providers. Calls block.
pub trait LlmProvider: Send + Sync {
    /// Returns the model's text answer to `request`.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

/// Request envelope shared by the providers.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: String,
    /// User turn.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

impl CompletionRequest {
    /// Builds a request from its parts.
    pub fn new(
        system: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Runs a blocking provider call on the blocking pool.
pub async fn complete_blocking(
    provider: std::sync::Arc<dyn LlmProvider>,
    request: CompletionRequest,
) -> Result<String> {
    tokio::task::spawn_blocking(move || provider.complete(&request))
        .await
        .map_err(|err| anyhow::anyhow!("completion task join error: {err}"))?
}
