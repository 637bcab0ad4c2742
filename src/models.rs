//! Persisted records shared by the store, the pipeline and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uploaded course document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier.
    pub id: Uuid,
    /// Owning course.
    pub course_id: String,
    /// Original upload file name.
    pub file_name: String,
    /// Logical storage path, `uploads/<course>/<millis>-<file>`.
    pub file_path: String,
    /// File type tag (always `pdf` today).
    pub file_type: String,
    /// Upload size in bytes.
    pub file_size: u64,
    /// User that uploaded the document.
    pub uploaded_by: String,
    /// True once every chunk has been embedded and stored.
    pub is_processed: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a [`Document`].
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Owning course.
    pub course_id: String,
    /// Original upload file name.
    pub file_name: String,
    /// Upload size in bytes.
    pub file_size: u64,
    /// Uploading user.
    pub uploaded_by: String,
}

impl NewDocument {
    /// Storage path derived from the course, upload time and file name.
    pub fn storage_path(&self, uploaded_at: DateTime<Utc>) -> String {
        format!(
            "uploads/{}/{}-{}",
            self.course_id,
            uploaded_at.timestamp_millis(),
            self.file_name
        )
    }
}

/// Free-form metadata stored with each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Source document file name.
    pub file_name: String,
    /// Ordinal of the chunk within its document.
    pub chunk_index: usize,
    /// Number of chunks the document was split into.
    pub total_chunks: usize,
    /// Whitespace word count of the chunk.
    pub word_count: usize,
}

/// Embedded slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Chunk identifier.
    pub id: Uuid,
    /// Owning document.
    pub document_id: Uuid,
    /// Zero-based ordinal within the document.
    pub chunk_index: usize,
    /// Chunk text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when storing a [`Chunk`].
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Owning document.
    pub document_id: Uuid,
    /// Zero-based ordinal within the document.
    pub chunk_index: usize,
    /// Chunk text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
}

/// Stored chunk joined with its parent document, as read at query time.
#[derive(Debug, Clone)]
pub struct CourseChunk {
    /// The chunk row.
    pub chunk: Chunk,
    /// Parent document, if it still exists.
    pub document: Option<Document>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Written by the student.
    User,
    /// Generated by the tutor.
    Ai,
}

impl MessageKind {
    /// Wire/database label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }

    /// Parses the wire/database label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "user" => Some(Self::User),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// One line of tutoring chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier.
    pub id: Uuid,
    /// Owner of the conversation.
    pub user_id: String,
    /// Message body.
    pub content: String,
    /// Author.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Course the message was asked about, if any.
    pub course_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when recording a [`ChatMessage`].
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    /// Owner of the conversation.
    pub user_id: String,
    /// Message body.
    pub content: String,
    /// Author.
    pub kind: MessageKind,
    /// Optional course scope.
    pub course_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn storage_path_embeds_course_and_millis() {
        let doc = NewDocument {
            course_id: "phys-101".into(),
            file_name: "laws.pdf".into(),
            file_size: 10,
            uploaded_by: "prof".into(),
        };
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(doc.storage_path(at), "uploads/phys-101/1700000000123-laws.pdf");
    }

    #[test]
    fn chunk_metadata_uses_camel_case() {
        let meta = ChunkMetadata {
            file_name: "a.pdf".into(),
            chunk_index: 0,
            total_chunks: 2,
            word_count: 7,
        };
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "fileName": "a.pdf", "chunkIndex": 0, "totalChunks": 2, "wordCount": 7 })
        );
    }

    #[test]
    fn message_kind_labels_round_trip() {
        for kind in [MessageKind::User, MessageKind::Ai] {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::parse("bot"), None);
    }
}
