//! Postgres-backed [`DocumentStore`].
//!
//! Embeddings are stored as JSONB arrays rather than a fixed-width vector column
//! because upstream and fallback vectors differ in dimensionality.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::Json;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use super::DocumentStore;
use crate::models::{
    ChatMessage, Chunk, ChunkMetadata, CourseChunk, Document, MessageKind, NewChatMessage,
    NewChunk, NewDocument,
};

/// Fully-qualified names of the three tables inside one schema.
#[derive(Debug, Clone)]
pub struct TableNames {
    schema: String,
}

impl TableNames {
    /// Builds table names inside `schema`.
    pub fn new(schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        Ok(Self { schema })
    }

    /// Quoted schema identifier.
    pub fn schema(&self) -> String {
        quote_ident(&self.schema)
    }

    /// `course_documents` table.
    pub fn documents(&self) -> String {
        self.qualified("course_documents")
    }

    /// `document_chunks` table.
    pub fn chunks(&self) -> String {
        self.qualified("document_chunks")
    }

    /// `chat_messages` table.
    pub fn messages(&self) -> String {
        self.qualified("chat_messages")
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

/// Document store over a single `tokio-postgres` connection.
pub struct PostgresStore {
    client: Client,
    tables: TableNames,
}

impl PostgresStore {
    /// Connects to `database_url` and drives the connection on a background task.
    pub async fn connect(database_url: &str, tables: TableNames) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .context("failed to connect to Postgres")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection error");
            }
        });
        Ok(Self { client, tables })
    }

    /// Creates the schema and tables when missing.
    pub async fn prepare(&self) -> Result<()> {
        let ddl = format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
            CREATE TABLE IF NOT EXISTS {documents} (
                id UUID PRIMARY KEY,
                course_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL DEFAULT 'pdf',
                file_size BIGINT NOT NULL,
                uploaded_by TEXT NOT NULL,
                is_processed BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {chunks} (
                id UUID PRIMARY KEY,
                document_id UUID NOT NULL REFERENCES {documents}(id) ON DELETE CASCADE,
                chunk_index BIGINT NOT NULL,
                content TEXT NOT NULL,
                embedding JSONB NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (document_id, chunk_index)
            );
            CREATE TABLE IF NOT EXISTS {messages} (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                kind TEXT NOT NULL,
                course_id TEXT,
                created_at TIMESTAMPTZ NOT NULL
            );",
            schema = self.tables.schema(),
            documents = self.tables.documents(),
            chunks = self.tables.chunks(),
            messages = self.tables.messages(),
        );
        self.client
            .batch_execute(&ddl)
            .await
            .context("failed to prepare tutoring tables")?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
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
        let sql = format!(
            "INSERT INTO {} (id, course_id, file_name, file_path, file_type, file_size, uploaded_by, is_processed, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.tables.documents()
        );
        let size = as_i64(record.file_size, "file_size")?;
        self.client
            .execute(
                &sql,
                &[
                    &record.id,
                    &record.course_id,
                    &record.file_name,
                    &record.file_path,
                    &record.file_type,
                    &size,
                    &record.uploaded_by,
                    &record.is_processed,
                    &record.created_at,
                ],
            )
            .await
            .with_context(|| format!("failed to insert document {}", record.file_name))?;
        Ok(record)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<Document> {
        let sql = format!(
            "UPDATE {} SET is_processed = TRUE WHERE id = $1 RETURNING *",
            self.tables.documents()
        );
        let row = self
            .client
            .query_opt(&sql, &[&id])
            .await
            .with_context(|| format!("failed to mark document {id} processed"))?
            .ok_or_else(|| anyhow!("document {id} not found"))?;
        document_from_row(&row, "")
    }

    async fn document(&self, id: Uuid) -> Result<Option<Document>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.tables.documents());
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.map(|row| document_from_row(&row, "")).transpose()
    }

    async fn course_documents(&self, course_id: &str) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT * FROM {} WHERE course_id = $1 ORDER BY created_at, id",
            self.tables.documents()
        );
        let rows = self.client.query(&sql, &[&course_id]).await?;
        rows.iter().map(|row| document_from_row(row, "")).collect()
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables.documents());
        let deleted = self.client.execute(&sql, &[&id]).await?;
        Ok(deleted > 0)
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<Chunk> {
        let record = Chunk {
            id: Uuid::new_v4(),
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            embedding: chunk.embedding,
            metadata: chunk.metadata,
            created_at: Utc::now(),
        };
        let sql = format!(
            "INSERT INTO {} (id, document_id, chunk_index, content, embedding, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.tables.chunks()
        );
        let index = as_i64(record.chunk_index, "chunk_index")?;
        self.client
            .execute(
                &sql,
                &[
                    &record.id,
                    &record.document_id,
                    &index,
                    &record.content,
                    &Json(&record.embedding),
                    &Json(&record.metadata),
                    &record.created_at,
                ],
            )
            .await
            .with_context(|| {
                format!(
                    "failed to insert chunk {} of document {}",
                    record.chunk_index, record.document_id
                )
            })?;
        Ok(record)
    }

    async fn course_chunks(&self, course_id: &str) -> Result<Vec<CourseChunk>> {
        let sql = format!(
            "SELECT \
                c.id, c.document_id, c.chunk_index, c.content, c.embedding, c.metadata, c.created_at, \
                d.id AS d_id, d.course_id AS d_course_id, d.file_name AS d_file_name, \
                d.file_path AS d_file_path, d.file_type AS d_file_type, d.file_size AS d_file_size, \
                d.uploaded_by AS d_uploaded_by, d.is_processed AS d_is_processed, \
                d.created_at AS d_created_at \
             FROM {chunks} c \
             JOIN {documents} d ON c.document_id = d.id \
             WHERE d.course_id = $1 \
             ORDER BY d.created_at, d.id, c.chunk_index",
            chunks = self.tables.chunks(),
            documents = self.tables.documents(),
        );
        let rows = self.client.query(&sql, &[&course_id]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(CourseChunk {
                chunk: chunk_from_row(&row)?,
                document: Some(document_from_row(&row, "d_")?),
            });
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
        let sql = format!(
            "INSERT INTO {} (id, user_id, content, kind, course_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
            self.tables.messages()
        );
        self.client
            .execute(
                &sql,
                &[
                    &record.id,
                    &record.user_id,
                    &record.content,
                    &record.kind.as_str(),
                    &record.course_id,
                    &record.created_at,
                ],
            )
            .await
            .context("failed to insert chat message")?;
        Ok(record)
    }

    async fn user_chat_messages(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT * FROM {} WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            self.tables.messages()
        );
        let limit = as_i64(limit, "limit")?;
        let rows = self.client.query(&sql, &[&user_id, &limit]).await?;
        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn document_from_row(row: &Row, prefix: &str) -> Result<Document> {
    let column = |name: &str| format!("{prefix}{name}");
    let file_size: i64 = row.try_get(column("file_size").as_str())?;
    Ok(Document {
        id: row.try_get(column("id").as_str())?,
        course_id: row.try_get(column("course_id").as_str())?,
        file_name: row.try_get(column("file_name").as_str())?,
        file_path: row.try_get(column("file_path").as_str())?,
        file_type: row.try_get(column("file_type").as_str())?,
        file_size: u64::try_from(file_size)
            .map_err(|_| anyhow!("negative file size {file_size}"))?,
        uploaded_by: row.try_get(column("uploaded_by").as_str())?,
        is_processed: row.try_get(column("is_processed").as_str())?,
        created_at: row.try_get::<_, DateTime<Utc>>(column("created_at").as_str())?,
    })
}

fn chunk_from_row(row: &Row) -> Result<Chunk> {
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let id: Uuid = row.try_get("id")?;
    let raw: Option<Json<serde_json::Value>> = row.try_get("embedding")?;
    let embedding = decode_embedding(id, raw.map(|Json(value)| value));
    let Json(metadata): Json<ChunkMetadata> = row.try_get("metadata")?;
    Ok(Chunk {
        id,
        document_id: row.try_get("document_id")?,
        chunk_index: usize::try_from(chunk_index)
            .map_err(|_| anyhow!("negative chunk index {chunk_index}"))?,
        content: row.try_get("content")?,
        embedding,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

/// Stored embedding as floats; unreadable values become an empty vector,
/// which scores 0 against any query.
fn decode_embedding(chunk_id: Uuid, raw: Option<serde_json::Value>) -> Vec<f32> {
    let Some(value) = raw else {
        return Vec::new();
    };
    serde_json::from_value(value).unwrap_or_else(|err| {
        tracing::warn!(%chunk_id, error = %err, "unreadable chunk embedding; scoring as empty");
        Vec::new()
    })
}

fn message_from_row(row: &Row) -> Result<ChatMessage> {
    let kind: String = row.try_get("kind")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        kind: MessageKind::parse(&kind).ok_or_else(|| anyhow!("unknown message kind {kind}"))?,
        course_id: row.try_get("course_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn as_i64<T>(value: T, field: &str) -> Result<i64>
where
    i64: TryFrom<T>,
    T: Copy + std::fmt::Display,
{
    i64::try_from(value).map_err(|_| anyhow!("{} value {} exceeds i64 range", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("public"), "\"public\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn undecodable_embeddings_become_empty() {
        let id = Uuid::new_v4();
        assert_eq!(
            decode_embedding(id, Some(serde_json::json!([0.5, -1.0]))),
            vec![0.5, -1.0]
        );
        assert!(decode_embedding(id, Some(serde_json::json!([null]))).is_empty());
        assert!(decode_embedding(id, Some(serde_json::json!("1,2,3"))).is_empty());
        assert!(decode_embedding(id, None).is_empty());
    }

    #[test]
    fn qualifies_tables_inside_schema() {
        let tables = TableNames::new("tutor").expect("valid schema");
        assert_eq!(tables.documents(), "\"tutor\".\"course_documents\"");
        assert_eq!(tables.chunks(), "\"tutor\".\"document_chunks\"");
        assert_eq!(tables.messages(), "\"tutor\".\"chat_messages\"");
        assert!(TableNames::new("  ").is_err());
    }
}
