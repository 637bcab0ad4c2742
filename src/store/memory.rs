use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::DocumentStore;
use crate::models::{
    ChatMessage, Chunk, CourseChunk, Document, NewChatMessage, NewChunk, NewDocument,
};

/// In-process store keeping rows in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    documents: Vec<Document>,
    chunks: HashMap<Uuid, Vec<Chunk>>,
    messages: Vec<ChatMessage>,
}

impl MemoryStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        let created_at = Utc::now();
        let record = Document {
            id: Uuid::new_v4(),
            file_path: document.storage_path(created_at),
            course_id: document.course_id,
            file_name: document.file_name,
            file_type: "pdf".to_string(),
            file_size: document.file_size,
            uploaded_by: document.uploaded_by,
            is_processed: false,
            created_at,
        };
        self.inner.lock().documents.push(record.clone());
        Ok(record)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<Document> {
        let mut tables = self.inner.lock();
        let document = tables
            .documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| anyhow!("document {id} not found"))?;
        document.is_processed = true;
        Ok(document.clone())
    }

    async fn document(&self, id: Uuid) -> Result<Option<Document>> {
        let tables = self.inner.lock();
        Ok(tables.documents.iter().find(|doc| doc.id == id).cloned())
    }

    async fn course_documents(&self, course_id: &str) -> Result<Vec<Document>> {
        let tables = self.inner.lock();
        Ok(tables
            .documents
            .iter()
            .filter(|doc| doc.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.lock();
        let before = tables.documents.len();
        tables.documents.retain(|doc| doc.id != id);
        tables.chunks.remove(&id);
        Ok(tables.documents.len() != before)
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<Chunk> {
        let mut tables = self.inner.lock();
        anyhow::ensure!(
            tables.documents.iter().any(|doc| doc.id == chunk.document_id),
            "document {} not found",
            chunk.document_id
        );
        let rows = tables.chunks.entry(chunk.document_id).or_default();
        anyhow::ensure!(
            rows.last()
                .map_or(true, |last| last.chunk_index < chunk.chunk_index),
            "chunk {} of document {} is out of order",
            chunk.chunk_index,
            chunk.document_id
        );
        let record = Chunk {
            id: Uuid::new_v4(),
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            embedding: chunk.embedding,
            metadata: chunk.metadata,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn course_chunks(&self, course_id: &str) -> Result<Vec<CourseChunk>> {
        let tables = self.inner.lock();
        let mut out = Vec::new();
        for document in tables.documents.iter().filter(|doc| doc.course_id == course_id) {
            let Some(rows) = tables.chunks.get(&document.id) else {
                continue;
            };
            out.extend(rows.iter().map(|chunk| CourseChunk {
                chunk: chunk.clone(),
                document: Some(document.clone()),
            }));
        }
        Ok(out)
    }

    async fn create_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage> {
        let record = ChatMessage {
            id: Uuid::new_v4(),
            user_id: message.user_id,
            content: message.content,
            kind: message.kind,
            course_id: message.course_id,
            created_at: Utc::now(),
        };
        self.inner.lock().messages.push(record.clone());
        Ok(record)
    }

    async fn user_chat_messages(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let tables = self.inner.lock();
        let mine: Vec<&ChatMessage> = tables
            .messages
            .iter()
            .filter(|message| message.user_id == user_id)
            .collect();
        let skip = mine.len().saturating_sub(limit);
        Ok(mine.into_iter().skip(skip).cloned().collect())
    }
}
