//! Upload processing: extract, chunk, embed and persist a document.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::chunker::Chunker;
use crate::embedder::EmbeddingService;
use crate::models::{ChunkMetadata, Document, NewChunk, NewDocument};
use crate::pdf::TextExtractor;
use crate::store::DocumentStore;

/// Summary of a finished processing run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The document after it was marked processed.
    pub document: Document,
    /// Number of chunks stored.
    pub chunks: usize,
}

/// Turns uploaded bytes into stored, embedded chunks.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    embedder: EmbeddingService,
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
}

impl Ingestor {
    /// Creates an ingestor writing to `store`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: EmbeddingService,
        extractor: Arc<dyn TextExtractor>,
        chunker: Chunker,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            chunker,
        }
    }

    /// Records an unprocessed document row for an upload.
    pub async fn register(&self, upload: NewDocument) -> Result<Document> {
        self.store
            .create_document(upload)
            .await
            .context("failed to create document record")
    }

    /// Registers and fully processes an upload before returning.
    pub async fn ingest(&self, upload: NewDocument, bytes: Vec<u8>) -> Result<IngestReport> {
        let document = self.register(upload).await?;
        self.process(document, bytes).await
    }

    /// Processes `bytes` for an already registered `document`.
    ///
    /// The processed flag is only set after every chunk is stored.
    pub async fn process(&self, document: Document, bytes: Vec<u8>) -> Result<IngestReport> {
        let started = Instant::now();
        let text = self
            .extractor
            .extract(bytes)
            .await
            .with_context(|| format!("failed to extract text from {}", document.file_name))?;
        let pieces = self.chunker.chunk(&text);
        let total_chunks = pieces.len();

        for piece in pieces {
            let embedding = self.embedder.embed(&piece.text).await;
            self.store
                .insert_chunk(NewChunk {
                    document_id: document.id,
                    chunk_index: piece.index,
                    metadata: ChunkMetadata {
                        file_name: document.file_name.clone(),
                        chunk_index: piece.index,
                        total_chunks,
                        word_count: piece.word_count,
                    },
                    content: piece.text,
                    embedding,
                })
                .await
                .with_context(|| format!("failed to store chunk {}", piece.index))?;
        }

        let document = self
            .store
            .mark_processed(document.id)
            .await
            .context("failed to mark document processed")?;
        tracing::info!(
            document_id = %document.id,
            file_name = %document.file_name,
            chunks = total_chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document processed"
        );
        Ok(IngestReport {
            document,
            chunks: total_chunks,
        })
    }

    /// Processes in the background. Failures are logged and leave the
    /// document unprocessed.
    pub fn spawn_processing(&self, document: Document, bytes: Vec<u8>) -> JoinHandle<()> {
        let ingestor = self.clone();
        tokio::spawn(async move {
            let document_id = document.id;
            if let Err(err) = ingestor.process(document, bytes).await {
                tracing::error!(%document_id, error = ?err, "document processing failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkingConfig;
    use crate::pdf::{PdfTextExtractor, PlainTextExtractor};
    use crate::store::MemoryStore;

    fn upload(name: &str) -> NewDocument {
        NewDocument {
            course_id: "phys".into(),
            file_name: name.into(),
            file_size: 64,
            uploaded_by: "prof".into(),
        }
    }

    fn ingestor(store: Arc<MemoryStore>, extractor: Arc<dyn TextExtractor>, words: usize) -> Ingestor {
        Ingestor::new(
            store,
            EmbeddingService::local(),
            extractor,
            Chunker::new(ChunkingConfig {
                words_per_chunk: words,
            }),
        )
    }

    #[tokio::test]
    async fn stores_contiguous_chunks_and_marks_processed() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = ingestor(store.clone(), Arc::new(PlainTextExtractor), 4);
        let report = ingestor
            .ingest(upload("notes.pdf"), b"one two three four five six seven".to_vec())
            .await
            .expect("ingest");
        assert!(report.document.is_processed);
        assert_eq!(report.chunks, 2);

        let chunks = store.course_chunks("phys").await.expect("chunks");
        let ordinals: Vec<usize> = chunks.iter().map(|c| c.chunk.chunk_index).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(chunks[1].chunk.content, "five six seven");
        assert_eq!(chunks[1].chunk.metadata.total_chunks, 2);
        assert_eq!(chunks[1].chunk.metadata.word_count, 3);
        assert!(chunks
            .iter()
            .all(|c| c.chunk.embedding.len() == crate::embedder::FALLBACK_DIMENSIONS));
    }

    #[tokio::test]
    async fn empty_text_is_processed_with_no_chunks() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = ingestor(store.clone(), Arc::new(PlainTextExtractor), 500);
        let report = ingestor
            .ingest(upload("blank.pdf"), b"   \n ".to_vec())
            .await
            .expect("ingest");
        assert_eq!(report.chunks, 0);
        assert!(report.document.is_processed);
    }

    #[tokio::test]
    async fn malformed_pdf_leaves_document_unprocessed() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = ingestor(store.clone(), Arc::new(PdfTextExtractor), 500);
        let document = ingestor.register(upload("broken.pdf")).await.expect("register");
        ingestor
            .spawn_processing(document.clone(), b"not a pdf".to_vec())
            .await
            .expect("join");
        let stored = store.document(document.id).await.expect("lookup").expect("row");
        assert!(!stored.is_processed);
        assert!(store.course_chunks("phys").await.expect("chunks").is_empty());
    }
}
