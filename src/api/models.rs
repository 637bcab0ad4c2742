//! Request and response bodies. JSON fields are camelCase.

use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;
use crate::retriever::SearchResult;
use crate::tutor::CourseProgress;

/// Default number of search hits.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Reply to an accepted upload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Fixed acknowledgement text.
    pub message: String,
    /// Original file name.
    pub file_name: String,
}

/// `POST /api/chat/rag` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagChatRequest {
    /// Student question.
    #[serde(default)]
    pub message: Option<String>,
    /// Course whose material answers it.
    #[serde(default)]
    pub course_id: Option<String>,
}

/// `POST /api/chat/message` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Student message.
    #[serde(default)]
    pub content: Option<String>,
    /// Optional course scope recorded with the history.
    #[serde(default)]
    pub course_id: Option<String>,
}

/// A recorded question/answer pair.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    /// The stored student message.
    pub user_message: ChatMessage,
    /// The stored tutor reply.
    pub ai_message: ChatMessage,
    /// Present and true for course-grounded answers.
    #[serde(
        rename = "isRAGResponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_rag_response: Option<bool>,
}

/// `POST /api/courses/{courseId}/search` body.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Search text.
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum hits.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Ranked search hits.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Best first.
    pub results: Vec<SearchResult>,
}

/// Study questions for a course.
#[derive(Debug, Serialize, Deserialize)]
pub struct StudyQuestionsResponse {
    /// At most five questions.
    pub questions: Vec<String>,
}

/// `POST /api/recommendations` body.
#[derive(Debug, Deserialize)]
pub struct RecommendationsRequest {
    /// Enrolled courses with progress.
    #[serde(default)]
    pub courses: Vec<CourseProgress>,
}

/// Study recommendations.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    /// Up to three recommendations.
    pub recommendations: Vec<String>,
}
