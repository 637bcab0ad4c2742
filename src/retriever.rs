//! Query-time ranking of a course's stored chunks.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::embedder::EmbeddingService;
use crate::models::{ChunkMetadata, CourseChunk};
use crate::similarity::cosine_similarity;
use crate::store::DocumentStore;

/// File name reported for chunks whose document row is gone.
pub const UNKNOWN_FILE_NAME: &str = "Unknown";

/// One ranked chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Chunk text.
    pub content: String,
    /// Cosine similarity to the query.
    pub similarity: f64,
    /// Source document file name.
    pub file_name: String,
    /// Stored chunk metadata.
    pub metadata: ChunkMetadata,
}

/// Embeds queries and scores them against every chunk of a course.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    embedder: EmbeddingService,
}

impl Retriever {
    /// Builds a retriever over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, embedder: EmbeddingService) -> Self {
        Self { store, embedder }
    }

    /// Returns at most `limit` chunks of `course_id`, best first.
    ///
    /// Storage failures are logged and yield an empty list.
    pub async fn search(&self, query: &str, course_id: &str, limit: usize) -> Vec<SearchResult> {
        if limit == 0 {
            return Vec::new();
        }
        let chunks = match self.store.course_chunks(course_id).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::error!(course_id, error = %err, "failed to load course chunks");
                return Vec::new();
            }
        };
        if chunks.is_empty() {
            return Vec::new();
        }
        let query_vector = self.embedder.embed_query(query).await;
        let results = rank(&query_vector, chunks, limit);
        tracing::debug!(course_id, limit, hits = results.len(), "search complete");
        results
    }
}

struct Scored {
    similarity: f64,
    chunk_index: usize,
    document_order: usize,
    document_id: Uuid,
    entry: CourseChunk,
}

/// Scores `chunks` (in store order) against `query_vector` and keeps the top `limit`.
///
/// Ties fall back to chunk ordinal, then document order, then document id.
pub fn rank(query_vector: &[f32], chunks: Vec<CourseChunk>, limit: usize) -> Vec<SearchResult> {
    let mut document_orders: Vec<Uuid> = Vec::new();
    let mut scored: Vec<Scored> = chunks
        .into_iter()
        .map(|entry| {
            let document_id = entry.chunk.document_id;
            let document_order = match document_orders.iter().position(|id| *id == document_id) {
                Some(pos) => pos,
                None => {
                    document_orders.push(document_id);
                    document_orders.len() - 1
                }
            };
            Scored {
                similarity: cosine_similarity(query_vector, &entry.chunk.embedding),
                chunk_index: entry.chunk.chunk_index,
                document_order,
                document_id,
                entry,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
            .then(a.document_order.cmp(&b.document_order))
            .then(a.document_id.cmp(&b.document_id))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|scored| {
            let CourseChunk { chunk, document } = scored.entry;
            SearchResult {
                content: chunk.content,
                similarity: scored.similarity,
                file_name: document
                    .map(|doc| doc.file_name)
                    .unwrap_or_else(|| UNKNOWN_FILE_NAME.to_string()),
                metadata: chunk.metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::fallback_embedding;
    use crate::models::{NewChunk, NewDocument};
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, course: &str, file: &str, texts: &[&str]) -> Uuid {
        let doc = store
            .create_document(NewDocument {
                course_id: course.into(),
                file_name: file.into(),
                file_size: 1,
                uploaded_by: "prof".into(),
            })
            .await
            .expect("document");
        for (index, text) in texts.iter().enumerate() {
            store
                .insert_chunk(NewChunk {
                    document_id: doc.id,
                    chunk_index: index,
                    content: text.to_string(),
                    embedding: fallback_embedding(text),
                    metadata: ChunkMetadata {
                        file_name: file.into(),
                        chunk_index: index,
                        total_chunks: texts.len(),
                        word_count: text.split_whitespace().count(),
                    },
                })
                .await
                .expect("chunk");
        }
        doc.id
    }

    fn retriever(store: Arc<MemoryStore>) -> Retriever {
        Retriever::new(store, EmbeddingService::local())
    }

    #[tokio::test]
    async fn empty_course_returns_nothing() {
        let store = Arc::new(MemoryStore::new());
        let results = retriever(store).search("anything", "empty", 3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_returns_nothing() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "c1", "a.pdf", &["some words here"]).await;
        assert!(retriever(store).search("words", "c1", 0).await.is_empty());
    }

    #[tokio::test]
    async fn limit_larger_than_pool_returns_whole_pool_sorted() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "c1", "a.pdf", &["alpha beta gamma", "delta epsilon", "zeta"]).await;
        seed(&store, "other", "b.pdf", &["alpha beta gamma"]).await;
        let results = retriever(store).search("alpha beta", "c1", 10).await;
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert!(results.iter().all(|r| r.file_name == "a.pdf"));
    }

    #[tokio::test]
    async fn newton_chunk_scores_positive() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            "phys",
            "newton.pdf",
            &["Newton's laws describe motion. The first law is inertia."],
        )
        .await;
        let results = retriever(store).search("What is inertia?", "phys", 3).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].similarity > 0.0);
        assert_eq!(results[0].metadata.word_count, 9);
    }

    #[test]
    fn ties_break_on_ordinal_then_document_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let make = |doc: Uuid, index: usize, name: &str| CourseChunk {
            chunk: crate::models::Chunk {
                id: Uuid::new_v4(),
                document_id: doc,
                chunk_index: index,
                content: format!("{name}-{index}"),
                embedding: vec![1.0, 0.0],
                metadata: ChunkMetadata {
                    file_name: name.into(),
                    chunk_index: index,
                    total_chunks: 2,
                    word_count: 1,
                },
                created_at: chrono::Utc::now(),
            },
            document: None,
        };
        let chunks = vec![
            make(first, 0, "a"),
            make(first, 1, "a"),
            make(second, 0, "b"),
            make(second, 1, "b"),
        ];
        let results = rank(&[1.0, 0.0], chunks, 4);
        let order: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["a-0", "b-0", "a-1", "b-1"]);
        assert!(results.iter().all(|r| r.file_name == UNKNOWN_FILE_NAME));
    }

    #[test]
    fn mismatched_embedding_scores_zero() {
        let chunk = CourseChunk {
            chunk: crate::models::Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: "x".into(),
                embedding: Vec::new(),
                metadata: ChunkMetadata {
                    file_name: "x.pdf".into(),
                    chunk_index: 0,
                    total_chunks: 1,
                    word_count: 1,
                },
                created_at: chrono::Utc::now(),
            },
            document: None,
        };
        let results = rank(&[0.5, 0.5], vec![chunk], 1);
        assert_eq!(results[0].similarity, 0.0);
    }
}
