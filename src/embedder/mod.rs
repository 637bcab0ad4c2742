//! Text embedding with an optional upstream API and a local fallback.

pub mod fallback;
pub mod openai;

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Result;
use lru::LruCache;
use tokio::sync::Mutex;

pub use fallback::{fallback_embedding, FALLBACK_DIMENSIONS};

/// Blocking embedding backend (an upstream API client).
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

/// Embedding front door: tries the configured backend, falls back locally.
///
/// Never fails. Query embeddings produced by the backend are memoized in an
/// LRU cache; fallback vectors are not cached so a recovered backend takes over.
#[derive(Clone)]
pub struct EmbeddingService {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    query_cache: Option<Arc<Mutex<LruCache<String, Vec<f32>>>>>,
}

impl EmbeddingService {
    /// Service that always uses the local fallback.
    pub fn local() -> Self {
        Self {
            backend: None,
            query_cache: None,
        }
    }

    /// Service backed by `backend`, with a query cache of `cache_size` entries (0 disables).
    pub fn with_backend(backend: Arc<dyn EmbeddingBackend>, cache_size: usize) -> Self {
        Self {
            backend: Some(backend),
            query_cache: build_cache(cache_size),
        }
    }

    /// True when an upstream backend is configured.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Embeds document text without caching.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match &self.backend {
            Some(backend) => self.embed_upstream(backend, text).await.0,
            None => fallback_embedding(text),
        }
    }

    /// Embeds a search query, consulting the cache first.
    pub async fn embed_query(&self, query: &str) -> Vec<f32> {
        let Some(backend) = &self.backend else {
            return fallback_embedding(query);
        };
        if let Some(cache) = &self.query_cache {
            if let Some(hit) = cache.lock().await.get(query).cloned() {
                return hit;
            }
        }
        let (embedding, from_backend) = self.embed_upstream(backend, query).await;
        if from_backend {
            if let Some(cache) = &self.query_cache {
                cache.lock().await.put(query.to_string(), embedding.clone());
            }
        }
        embedding
    }

    async fn embed_upstream(
        &self,
        backend: &Arc<dyn EmbeddingBackend>,
        text: &str,
    ) -> (Vec<f32>, bool) {
        let worker = Arc::clone(backend);
        let owned = text.to_string();
        let outcome = tokio::task::spawn_blocking(move || worker.embed(&owned)).await;
        match outcome {
            Ok(Ok(embedding)) if !embedding.is_empty() => (embedding, true),
            Ok(Ok(_)) => {
                tracing::warn!(backend = backend.name(), "empty embedding; using local fallback");
                (fallback_embedding(text), false)
            }
            Ok(Err(err)) => {
                tracing::warn!(backend = backend.name(), error = %err, "embedding failed; using local fallback");
                (fallback_embedding(text), false)
            }
            Err(err) => {
                tracing::warn!(backend = backend.name(), error = %err, "embedding task aborted; using local fallback");
                (fallback_embedding(text), false)
            }
        }
    }
}

fn build_cache(size: usize) -> Option<Arc<Mutex<LruCache<String, Vec<f32>>>>> {
    NonZeroUsize::new(size).map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity))))
}
