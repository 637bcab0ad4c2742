use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use campus_tutor::api::{DEFAULT_MAX_SEARCH_LIMIT, DEFAULT_MAX_UPLOAD_BYTES};
use campus_tutor::{create_router, AppState, PdfTextExtractor, ServiceArgs};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tutor-api",
    about = "HTTP API for course-document upload, retrieval and tutoring answers"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "TUTOR_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "TUTOR_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Maximum search limit allowed per request.
    #[arg(long, env = "TUTOR_MAX_SEARCH_LIMIT", default_value_t = DEFAULT_MAX_SEARCH_LIMIT)]
    max_search_limit: usize,

    #[command(flatten)]
    service: ServiceArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = ApiCli::parse();
    let store = cli.service.connect_store().await?;
    let (embedder, provider) = cli.service.build_upstream().await?;
    let state = AppState::new(
        store,
        embedder,
        provider,
        Arc::new(PdfTextExtractor),
        cli.service.chunker(),
    )
    .with_max_upload_bytes(cli.max_upload_bytes)
    .with_max_search_limit(cli.max_search_limit);
    let app = create_router(state);

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "tutor-api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
