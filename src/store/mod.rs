//! Persistence seam for documents, chunks and chat history.
//!
//! The pipeline only talks to [`DocumentStore`]; [`MemoryStore`] backs tests and
//! single-process runs, [`PostgresStore`] backs deployments with `DATABASE_URL`.

mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    ChatMessage, Chunk, CourseChunk, Document, NewChatMessage, NewChunk, NewDocument,
};

pub use memory::MemoryStore;
pub use postgres::{PostgresStore, TableNames};

/// Default number of chat messages returned for a user.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Create/read/update operations the tutoring pipeline needs from storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new, unprocessed document.
    async fn create_document(&self, document: NewDocument) -> Result<Document>;

    /// Flips the processed flag of `id` to true.
    async fn mark_processed(&self, id: Uuid) -> Result<Document>;

    /// Looks up a single document.
    async fn document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Documents of a course in upload order.
    async fn course_documents(&self, course_id: &str) -> Result<Vec<Document>>;

    /// Removes a document and its chunks. Returns false when it did not exist.
    async fn delete_document(&self, id: Uuid) -> Result<bool>;

    /// Stores one embedded chunk.
    async fn insert_chunk(&self, chunk: NewChunk) -> Result<Chunk>;

    /// All chunks of a course joined with their documents, in document upload
    /// order and ascending chunk ordinal.
    async fn course_chunks(&self, course_id: &str) -> Result<Vec<CourseChunk>>;

    /// Records a chat message.
    async fn create_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage>;

    /// The user's most recent `limit` messages in chronological order.
    async fn user_chat_messages(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;
}
