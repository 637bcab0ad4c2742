//! HTTP handlers and shared application state.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::models::*;
use crate::api::{DEFAULT_MAX_SEARCH_LIMIT, DEFAULT_MAX_UPLOAD_BYTES};
use crate::chunker::Chunker;
use crate::composer::AnswerComposer;
use crate::embedder::EmbeddingService;
use crate::ingest::Ingestor;
use crate::llm::LlmProvider;
use crate::models::{ChatMessage, Document, MessageKind, NewChatMessage, NewDocument};
use crate::pdf::{TextExtractor, PDF_CONTENT_TYPE};
use crate::retriever::Retriever;
use crate::store::{DocumentStore, DEFAULT_HISTORY_LIMIT};
use crate::tutor::Tutor;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Upload acknowledgement text.
pub const UPLOAD_ACCEPTED_MESSAGE: &str = "Document uploaded successfully and is being processed";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Document, chunk and chat storage.
    pub store: Arc<dyn DocumentStore>,
    /// Upload processing.
    pub ingestor: Ingestor,
    /// Course-grounded answers.
    pub composer: AnswerComposer,
    /// Plain chat.
    pub tutor: Tutor,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
    /// Largest `limit` accepted by search.
    pub max_search_limit: usize,
}

impl AppState {
    /// Wires the pipeline components over one store.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: EmbeddingService,
        provider: Option<Arc<dyn LlmProvider>>,
        extractor: Arc<dyn TextExtractor>,
        chunker: Chunker,
    ) -> Self {
        let retriever = Retriever::new(store.clone(), embedder.clone());
        Self {
            ingestor: Ingestor::new(store.clone(), embedder, extractor, chunker),
            composer: AnswerComposer::new(retriever, provider.clone()),
            tutor: Tutor::new(provider),
            store,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_search_limit: DEFAULT_MAX_SEARCH_LIMIT,
        }
    }

    /// Overrides the upload size limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes.max(1);
        self
    }

    /// Overrides the search `limit` cap.
    pub fn with_max_search_limit(mut self, limit: usize) -> Self {
        self.max_search_limit = limit.max(1);
        self
    }
}

/// Caller id taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".into()))
    }
}

/// JSON body whose rejections render as [`ApiError::BadRequest`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    tracing::debug!(status = %rejection.status(), "rejected JSON body");
    ApiError::BadRequest(rejection.body_text())
}

/// Liveness probe.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Lists a course's documents in upload order.
pub async fn list_documents(
    State(state): State<AppState>,
    CallerId(_user): CallerId,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = state
        .store
        .course_documents(&course_id)
        .await
        .map_err(|err| ApiError::internal("Failed to fetch documents", err))?;
    Ok(Json(documents))
}

/// Accepts a PDF and processes it in the background.
pub async fn upload_document(
    State(state): State<AppState>,
    CallerId(user): CallerId,
    Path(course_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("document") {
            continue;
        }
        if field.content_type() != Some(PDF_CONTENT_TYPE) {
            return Err(ApiError::BadRequest("Only PDF files are allowed".into()));
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "document.pdf".to_string());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, bytes));
        break;
    }
    let Some((file_name, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file uploaded".into()));
    };
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            state.max_upload_bytes
        )));
    }

    let document = state
        .ingestor
        .register(NewDocument {
            course_id,
            file_name: file_name.clone(),
            file_size: bytes.len() as u64,
            uploaded_by: user,
        })
        .await
        .map_err(|err| ApiError::internal("Failed to upload document", err))?;
    tracing::info!(document_id = %document.id, course_id = %document.course_id, bytes = bytes.len(), "upload accepted");
    state.ingestor.spawn_processing(document, bytes.to_vec());

    Ok(Json(UploadResponse {
        message: UPLOAD_ACCEPTED_MESSAGE.to_string(),
        file_name,
    }))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".into())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Removes a document and its chunks.
pub async fn delete_document(
    State(state): State<AppState>,
    CallerId(_user): CallerId,
    Path((course_id, document_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let document = state
        .store
        .document(document_id)
        .await
        .map_err(|err| ApiError::internal("Failed to delete document", err))?
        .filter(|doc| doc.course_id == course_id)
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    let removed = state
        .store
        .delete_document(document.id)
        .await
        .map_err(|err| ApiError::internal("Failed to delete document", err))?;
    if !removed {
        return Err(ApiError::NotFound("Document not found".into()));
    }
    tracing::info!(%document_id, %course_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Answers a question from course material and records the exchange.
pub async fn rag_chat(
    State(state): State<AppState>,
    CallerId(user): CallerId,
    ApiJson(request): ApiJson<RagChatRequest>,
) -> Result<Json<ChatExchange>, ApiError> {
    let (Some(query), Some(course_id)) = (
        required(request.message),
        required(request.course_id),
    ) else {
        return Err(ApiError::BadRequest(
            "Query and courseId are required".into(),
        ));
    };
    let answer = state.composer.answer(&query, &course_id, &user).await;
    let (user_message, ai_message) =
        record_exchange(&state, &user, query, answer, Some(course_id))
            .await
            .map_err(|err| ApiError::internal("Failed to process query", err))?;
    Ok(Json(ChatExchange {
        user_message,
        ai_message,
        is_rag_response: Some(true),
    }))
}

/// Plain tutoring chat.
pub async fn chat_message(
    State(state): State<AppState>,
    CallerId(user): CallerId,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatExchange>, ApiError> {
    let Some(content) = required(request.content) else {
        return Err(ApiError::BadRequest("Message content is required".into()));
    };
    let course_id = required(request.course_id);
    let user_message = state
        .store
        .create_chat_message(NewChatMessage {
            user_id: user.clone(),
            content: content.clone(),
            kind: MessageKind::User,
            course_id: course_id.clone(),
        })
        .await
        .map_err(|err| ApiError::internal("Failed to process message", err))?;
    let reply = state.tutor.reply(&content).await;
    let ai_message = state
        .store
        .create_chat_message(NewChatMessage {
            user_id: user,
            content: reply,
            kind: MessageKind::Ai,
            course_id,
        })
        .await
        .map_err(|err| ApiError::internal("Failed to process message", err))?;
    Ok(Json(ChatExchange {
        user_message,
        ai_message,
        is_rag_response: None,
    }))
}

/// The caller's recent chat history, oldest first.
pub async fn chat_history(
    State(state): State<AppState>,
    CallerId(user): CallerId,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = state
        .store
        .user_chat_messages(&user, DEFAULT_HISTORY_LIMIT)
        .await
        .map_err(|err| ApiError::internal("Failed to fetch chat messages", err))?;
    Ok(Json(messages))
}

/// Ranked chunk search within a course.
pub async fn search_documents(
    State(state): State<AppState>,
    CallerId(_user): CallerId,
    Path(course_id): Path<String>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Some(query) = required(request.query) else {
        return Err(ApiError::BadRequest("Search query is required".into()));
    };
    let limit = request
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(state.max_search_limit);
    let results = state
        .composer
        .retriever()
        .search(&query, &course_id, limit)
        .await;
    Ok(Json(SearchResponse { results }))
}

/// Study questions drawn from a course's material.
pub async fn study_questions(
    State(state): State<AppState>,
    CallerId(_user): CallerId,
    Path(course_id): Path<String>,
) -> Json<StudyQuestionsResponse> {
    let questions = state.composer.study_questions(&course_id).await;
    Json(StudyQuestionsResponse { questions })
}

/// Study recommendations for the caller's enrolment.
pub async fn recommendations(
    State(state): State<AppState>,
    CallerId(_user): CallerId,
    ApiJson(request): ApiJson<RecommendationsRequest>,
) -> Json<RecommendationsResponse> {
    let recommendations = state.tutor.recommendations(&request.courses).await;
    Json(RecommendationsResponse { recommendations })
}

async fn record_exchange(
    state: &AppState,
    user: &str,
    question: String,
    answer: String,
    course_id: Option<String>,
) -> anyhow::Result<(ChatMessage, ChatMessage)> {
    let user_message = state
        .store
        .create_chat_message(NewChatMessage {
            user_id: user.to_string(),
            content: question,
            kind: MessageKind::User,
            course_id: course_id.clone(),
        })
        .await?;
    let ai_message = state
        .store
        .create_chat_message(NewChatMessage {
            user_id: user.to_string(),
            content: answer,
            kind: MessageKind::Ai,
            course_id,
        })
        .await?;
    Ok((user_message, ai_message))
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
