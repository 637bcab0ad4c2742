//! Command-line and environment configuration shared by the binaries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::chunker::{Chunker, ChunkingConfig, DEFAULT_CHUNK_WORDS};
use crate::embedder::openai::{OpenAiEmbedder, OpenAiEmbedderConfig, DEFAULT_EMBEDDING_MODEL};
use crate::embedder::EmbeddingService;
use crate::llm::{
    AnthropicProvider, LlmProvider, OpenAiProvider, DEFAULT_ANTHROPIC_MODEL,
    DEFAULT_OPENAI_CHAT_MODEL,
};
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, MemoryStore, PostgresStore, TableNames};

/// Which completion provider answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderChoice {
    /// OpenAI when its key is set, else Anthropic when its key is set, else none.
    Auto,
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages.
    Anthropic,
    /// Always use the local fallbacks.
    None,
}

/// Settings for storage, upstream APIs and chunking.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Postgres connection string; omit to keep everything in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Schema holding the tutor tables.
    #[arg(long, env = "TUTOR_SCHEMA", default_value = "public")]
    pub schema: String,

    /// OpenAI API key (embeddings and chat).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Generic key used for OpenAI when `OPENAI_API_KEY` is unset.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Anthropic API key (chat only).
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Completion provider selection.
    #[arg(long, env = "TUTOR_LLM_PROVIDER", value_enum, default_value_t = ProviderChoice::Auto)]
    pub llm_provider: ProviderChoice,

    /// Base URL for OpenAI-compatible endpoints.
    #[arg(long, env = "TUTOR_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Embedding model identifier.
    #[arg(long, env = "TUTOR_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Optional embedding dimension override.
    #[arg(long, env = "TUTOR_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// OpenAI chat model.
    #[arg(long, env = "TUTOR_OPENAI_CHAT_MODEL", default_value = DEFAULT_OPENAI_CHAT_MODEL)]
    pub openai_chat_model: String,

    /// Base URL for the Anthropic API.
    #[arg(long, env = "TUTOR_ANTHROPIC_BASE", default_value = "https://api.anthropic.com/v1")]
    pub anthropic_base_url: String,

    /// Anthropic model.
    #[arg(long, env = "TUTOR_ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL)]
    pub anthropic_model: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "TUTOR_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Attempts per upstream call, including the first.
    #[arg(long, env = "TUTOR_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// Base backoff between upstream retries, in milliseconds.
    #[arg(long, env = "TUTOR_RETRY_BASE_MS", default_value_t = 500)]
    pub retry_base_ms: u64,

    /// Words per chunk.
    #[arg(long, env = "TUTOR_CHUNK_WORDS", default_value_t = DEFAULT_CHUNK_WORDS)]
    pub chunk_words: usize,

    /// Cached query embeddings (0 disables).
    #[arg(long, env = "TUTOR_QUERY_CACHE", default_value_t = 256)]
    pub query_cache_size: usize,
}

impl ServiceArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_ms))
    }

    /// Chunker configured from `--chunk-words`.
    pub fn chunker(&self) -> Chunker {
        Chunker::new(ChunkingConfig {
            words_per_chunk: self.chunk_words,
        })
    }

    /// OpenAI key, falling back to `API_KEY`.
    pub fn openai_key(&self) -> Option<String> {
        non_blank(&self.openai_api_key).or_else(|| non_blank(&self.api_key))
    }

    /// Builds the embedder and completion provider on the blocking pool.
    ///
    /// The upstream clients are `reqwest::blocking` clients, which must not be
    /// constructed on an async worker thread.
    pub async fn build_upstream(
        &self,
    ) -> Result<(EmbeddingService, Option<Arc<dyn LlmProvider>>)> {
        let args = self.clone();
        tokio::task::spawn_blocking(move || Ok((args.build_embedder()?, args.build_provider()?)))
            .await
            .context("upstream client setup task failed")?
    }

    /// Embedding service; local-only without an OpenAI key.
    ///
    /// Blocking: call from [`ServiceArgs::build_upstream`] or outside a runtime.
    pub fn build_embedder(&self) -> Result<EmbeddingService> {
        let Some(api_key) = self.openai_key() else {
            tracing::info!("no OpenAI key configured; using local embeddings");
            return Ok(EmbeddingService::local());
        };
        let backend = OpenAiEmbedder::new(OpenAiEmbedderConfig {
            api_key,
            base_url: self.openai_base_url.clone(),
            model: self.embedding_model.clone(),
            dimensions: self.embedding_dimensions,
            timeout: self.timeout(),
            retry: self.retry(),
        })?;
        tracing::info!(model = backend.model(), "using upstream embeddings");
        Ok(EmbeddingService::with_backend(
            Arc::new(backend),
            self.query_cache_size,
        ))
    }

    /// Completion provider per `--llm-provider`, if any.
    ///
    /// Blocking, like [`ServiceArgs::build_embedder`].
    pub fn build_provider(&self) -> Result<Option<Arc<dyn LlmProvider>>> {
        let openai = self.openai_key();
        let anthropic = non_blank(&self.anthropic_api_key);
        let provider: Option<Arc<dyn LlmProvider>> = match (self.llm_provider, openai, anthropic) {
            (ProviderChoice::None, _, _) => None,
            (ProviderChoice::Openai, None, _) => {
                anyhow::bail!("--llm-provider openai requires OPENAI_API_KEY or API_KEY")
            }
            (ProviderChoice::Anthropic, _, None) => {
                anyhow::bail!("--llm-provider anthropic requires ANTHROPIC_API_KEY")
            }
            (ProviderChoice::Openai | ProviderChoice::Auto, Some(key), _) => {
                Some(Arc::new(OpenAiProvider::new(
                    key,
                    &self.openai_base_url,
                    self.openai_chat_model.clone(),
                    self.timeout(),
                    self.retry(),
                )?))
            }
            (ProviderChoice::Anthropic | ProviderChoice::Auto, _, Some(key)) => {
                Some(Arc::new(AnthropicProvider::new(
                    key,
                    &self.anthropic_base_url,
                    self.anthropic_model.clone(),
                    self.timeout(),
                    self.retry(),
                )?))
            }
            (ProviderChoice::Auto, None, None) => None,
        };
        match &provider {
            Some(provider) => tracing::info!(provider = provider.name(), "completion provider ready"),
            None => tracing::info!("no completion provider; answers use local fallbacks"),
        }
        Ok(provider)
    }

    /// Postgres store when `DATABASE_URL` is set, otherwise an in-memory store.
    pub async fn connect_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match non_blank(&self.database_url) {
            Some(url) => {
                let tables = TableNames::new(self.schema.clone())?;
                let store = PostgresStore::connect(&url, tables)
                    .await
                    .context("failed to connect to Postgres")?;
                store.prepare().await?;
                tracing::info!(schema = %self.schema, "using Postgres store");
                Ok(Arc::new(store))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; documents are kept in memory only");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
