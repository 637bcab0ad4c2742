//! REST API: axum router, handlers, bodies and errors.

pub mod errors;
pub mod handlers;
pub mod models;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

pub use errors::ApiError;
pub use handlers::{ApiJson, AppState, CallerId, USER_ID_HEADER};

/// Upload size accepted by default (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Largest search `limit` honoured by default.
pub const DEFAULT_MAX_SEARCH_LIMIT: usize = 50;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the service router over `state`.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/api/courses/{course_id}/documents",
            get(handlers::list_documents),
        )
        .route(
            "/api/courses/{course_id}/documents/upload",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/courses/{course_id}/documents/{document_id}",
            delete(handlers::delete_document),
        )
        .route(
            "/api/courses/{course_id}/search",
            post(handlers::search_documents),
        )
        .route(
            "/api/courses/{course_id}/study-questions",
            get(handlers::study_questions),
        )
        .route("/api/chat/rag", post(handlers::rag_chat))
        .route("/api/chat/message", post(handlers::chat_message))
        .route("/api/chat/messages", get(handlers::chat_history))
        .route("/api/recommendations", post(handlers::recommendations))
        .with_state(state)
}
