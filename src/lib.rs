#![warn(missing_docs)]
//! Core library for the campus tutor: course-document ingestion, retrieval and
//! grounded answers.

pub mod api;
pub mod chunker;
pub mod composer;
pub mod config;
pub mod embedder;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod retriever;
pub mod retry;
pub mod similarity;
pub mod store;
mod tokenize;
pub mod tutor;

pub use api::{create_router, AppState};
pub use chunker::{Chunker, ChunkingConfig, TextChunk, DEFAULT_CHUNK_WORDS};
pub use composer::{AnswerComposer, NO_DOCUMENTS_MESSAGE};
pub use config::{ProviderChoice, ServiceArgs};
pub use embedder::{EmbeddingBackend, EmbeddingService};
pub use ingest::{IngestReport, Ingestor};
pub use llm::{CompletionRequest, LlmProvider};
pub use models::{ChatMessage, Chunk, ChunkMetadata, Document, MessageKind};
pub use pdf::{PdfTextExtractor, PlainTextExtractor, TextExtractor};
pub use retriever::{Retriever, SearchResult};
pub use retry::RetryPolicy;
pub use similarity::cosine_similarity;
pub use store::{DocumentStore, MemoryStore, PostgresStore};
pub use tutor::{CourseProgress, Tutor};
