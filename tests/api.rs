use std::sync::Arc;
use std::time::Duration;

use campus_tutor::api::USER_ID_HEADER;
use campus_tutor::composer::{EMPTY_COURSE_QUESTIONS, NO_DOCUMENTS_MESSAGE};
use campus_tutor::tutor::{fallback_reply, DEFAULT_RECOMMENDATIONS};
use campus_tutor::{
    create_router, AppState, Chunker, ChunkingConfig, EmbeddingService, MemoryStore,
    PlainTextExtractor,
};
use pretty_assertions::assert_eq;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const NEWTON: &str = "Newton's laws describe motion. The first law is inertia.";

async fn spawn_app() -> String {
    spawn_with(|state| state).await
}

async fn spawn_with(configure: impl FnOnce(AppState) -> AppState) -> String {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        EmbeddingService::local(),
        None,
        Arc::new(PlainTextExtractor),
        Chunker::new(ChunkingConfig::default()),
    );
    let app = create_router(configure(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{addr}")
}

fn client() -> Client {
    Client::new()
}

fn pdf_form(file_name: &str, body: &[u8], mime: &str) -> Form {
    let part = Part::bytes(body.to_vec())
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("mime");
    Form::new().part("document", part)
}

async fn upload(base: &str, course: &str, file_name: &str, body: &[u8]) -> reqwest::Response {
    client()
        .post(format!("{base}/api/courses/{course}/documents/upload"))
        .header(USER_ID_HEADER, "prof")
        .multipart(pdf_form(file_name, body, "application/pdf"))
        .send()
        .await
        .expect("upload request")
}

async fn documents(base: &str, course: &str) -> Vec<Value> {
    client()
        .get(format!("{base}/api/courses/{course}/documents"))
        .header(USER_ID_HEADER, "prof")
        .send()
        .await
        .expect("list request")
        .json()
        .await
        .expect("list body")
}

async fn wait_processed(base: &str, course: &str) -> Vec<Value> {
    for _ in 0..100 {
        let docs = documents(base, course).await;
        if !docs.is_empty() && docs.iter().all(|doc| doc["isProcessed"] == json!(true)) {
            return docs;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("documents in {course} never finished processing");
}

async fn post_json(base: &str, path: &str, user: &str, body: Value) -> reqwest::Response {
    client()
        .post(format!("{base}{path}"))
        .header(USER_ID_HEADER, user)
        .json(&body)
        .send()
        .await
        .expect("request")
}

#[tokio::test]
async fn healthz_is_open() {
    let base = spawn_app().await;
    let resp = client()
        .get(format!("{base}/healthz"))
        .send()
        .await
        .expect("healthz");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let base = spawn_app().await;
    let resp = client()
        .post(format!("{base}/api/chat/rag"))
        .json(&json!({ "message": "hi", "courseId": "phys" }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("body");
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
async fn upload_then_answer_from_material() {
    let base = spawn_app().await;
    let resp = upload(&base, "phys", "newton.pdf", NEWTON.as_bytes()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("upload body");
    assert_eq!(
        body,
        json!({
            "message": "Document uploaded successfully and is being processed",
            "fileName": "newton.pdf"
        })
    );

    let docs = wait_processed(&base, "phys").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["fileType"], "pdf");
    assert!(docs[0]["filePath"]
        .as_str()
        .expect("path")
        .starts_with("uploads/phys/"));

    let resp = post_json(
        &base,
        "/api/chat/rag",
        "student",
        json!({ "message": "What is inertia?", "courseId": "phys" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let exchange: Value = resp.json().await.expect("rag body");
    assert_eq!(exchange["isRAGResponse"], json!(true));
    assert_eq!(exchange["userMessage"]["type"], "user");
    assert_eq!(exchange["aiMessage"]["type"], "ai");
    let answer = exchange["aiMessage"]["content"].as_str().expect("answer");
    assert_eq!(
        answer,
        "Based on the course materials, here's what I found:\n\nThe first law is inertia\n\nFor more detailed information, please refer to the complete documents.\n\n📚 Sources:\n1. newton.pdf"
    );

    let history: Vec<Value> = client()
        .get(format!("{base}/api/chat/messages"))
        .header(USER_ID_HEADER, "student")
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("history body");
    let kinds: Vec<&str> = history
        .iter()
        .map(|msg| msg["type"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(kinds, vec!["user", "ai"]);
}

#[tokio::test]
async fn search_ranks_course_chunks() {
    let base = spawn_app().await;
    upload(&base, "phys", "newton.pdf", NEWTON.as_bytes()).await;
    wait_processed(&base, "phys").await;

    let resp = post_json(
        &base,
        "/api/courses/phys/search",
        "student",
        json!({ "query": "What is inertia?" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("search body");
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["fileName"], "newton.pdf");
    assert_eq!(results[0]["metadata"]["wordCount"], 9);
    assert!(results[0]["similarity"].as_f64().expect("similarity") > 0.0);

    let resp = post_json(&base, "/api/courses/phys/search", "student", json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_course_answers_with_no_documents_message() {
    let base = spawn_app().await;
    let resp = post_json(
        &base,
        "/api/chat/rag",
        "student",
        json!({ "message": "What is inertia?", "courseId": "empty" }),
    )
    .await;
    let exchange: Value = resp.json().await.expect("body");
    assert_eq!(exchange["aiMessage"]["content"], NO_DOCUMENTS_MESSAGE);

    let questions: Value = client()
        .get(format!("{base}/api/courses/empty/study-questions"))
        .header(USER_ID_HEADER, "student")
        .send()
        .await
        .expect("questions")
        .json()
        .await
        .expect("questions body");
    assert_eq!(questions["questions"], json!(EMPTY_COURSE_QUESTIONS));
}

#[tokio::test]
async fn rag_chat_requires_message_and_course() {
    let base = spawn_app().await;
    for body in [
        json!({ "message": "   ", "courseId": "phys" }),
        json!({ "message": "hi" }),
        json!({}),
    ] {
        let resp = post_json(&base, "/api/chat/rag", "student", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = resp.json().await.expect("error body");
        assert_eq!(err["message"], "Query and courseId are required");
    }
}

#[tokio::test]
async fn malformed_bodies_get_json_bad_request() {
    let base = spawn_app().await;
    let cases = [
        ("/api/chat/rag", "not json".to_string()),
        (
            "/api/chat/rag",
            json!({ "message": 5, "courseId": "x" }).to_string(),
        ),
        (
            "/api/courses/phys/search",
            json!({ "query": "x", "limit": -1 }).to_string(),
        ),
        ("/api/recommendations", json!({ "courses": "none" }).to_string()),
    ];
    for (path, body) in cases {
        let resp = client()
            .post(format!("{base}{path}"))
            .header(USER_ID_HEADER, "student")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path}");
        let err: Value = resp.json().await.expect("json error body");
        assert!(
            err["message"].as_str().is_some_and(|msg| !msg.is_empty()),
            "{path}: {err}"
        );
    }
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let base = spawn_app_with_small_limit().await;

    let resp = client()
        .post(format!("{base}/api/courses/phys/documents/upload"))
        .header(USER_ID_HEADER, "prof")
        .multipart(pdf_form("notes.txt", b"plain", "text/plain"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client()
        .post(format!("{base}/api/courses/phys/documents/upload"))
        .header(USER_ID_HEADER, "prof")
        .multipart(Form::new().text("other", "value"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = resp.json().await.expect("error body");
    assert_eq!(err["message"], "No file uploaded");

    let resp = upload(&base, "phys", "big.pdf", &[b'a'; 128]).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(documents(&base, "phys").await.is_empty());
}

async fn spawn_app_with_small_limit() -> String {
    spawn_with(|state| state.with_max_upload_bytes(64)).await
}

#[tokio::test]
async fn delete_removes_document_and_chunks() {
    let base = spawn_app().await;
    upload(&base, "phys", "newton.pdf", NEWTON.as_bytes()).await;
    let docs = wait_processed(&base, "phys").await;
    let id = docs[0]["id"].as_str().expect("id").to_string();

    let resp = client()
        .delete(format!("{base}/api/courses/other/documents/{id}"))
        .header(USER_ID_HEADER, "prof")
        .send()
        .await
        .expect("delete");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client()
        .delete(format!("{base}/api/courses/phys/documents/{id}"))
        .header(USER_ID_HEADER, "prof")
        .send()
        .await
        .expect("delete");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(documents(&base, "phys").await.is_empty());

    let body: Value = post_json(
        &base,
        "/api/courses/phys/search",
        "student",
        json!({ "query": "inertia" }),
    )
    .await
    .json()
    .await
    .expect("search body");
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn plain_chat_and_recommendations_fall_back_locally() {
    let base = spawn_app().await;
    let resp = post_json(
        &base,
        "/api/chat/message",
        "student",
        json!({ "content": "Explain derivatives" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let exchange: Value = resp.json().await.expect("chat body");
    assert_eq!(
        exchange["aiMessage"]["content"],
        fallback_reply("Explain derivatives")
    );
    assert!(exchange.get("isRAGResponse").is_none());

    let body: Value = post_json(
        &base,
        "/api/recommendations",
        "student",
        json!({ "courses": [{ "title": "Physics", "progress": 40 }] }),
    )
    .await
    .json()
    .await
    .expect("recommendations body");
    assert_eq!(body["recommendations"], json!(DEFAULT_RECOMMENDATIONS));
}
