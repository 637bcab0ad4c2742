use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use campus_tutor::composer::build_context;
use campus_tutor::models::NewDocument;
use campus_tutor::{
    AnswerComposer, Ingestor, PdfTextExtractor, PlainTextExtractor, Retriever, ServiceArgs,
    TextExtractor,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tutor-cli",
    about = "Ingest local course files and ask a question against them"
)]
struct TutorCli {
    /// Course files to ingest (PDF, or UTF-8 text for other extensions)
    #[arg(long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Course id the files are filed under
    #[arg(long, default_value = "local")]
    course: String,

    /// Question to answer from the ingested material
    #[arg(long)]
    query: Option<String>,

    /// Number of chunks shown in dry-run mode
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Print study questions for the course
    #[arg(long, default_value_t = false)]
    study_questions: bool,

    /// Only print the retrieved context (skip answer composition)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    service: ServiceArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = TutorCli::parse();
    if cli.query.is_none() && !cli.study_questions {
        bail!("nothing to do; pass --query and/or --study-questions");
    }
    let store = cli.service.connect_store().await?;
    let (embedder, provider) = cli.service.build_upstream().await?;
    let chunker = cli.service.chunker();

    for path in &cli.files {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let extractor: Arc<dyn TextExtractor> = if is_pdf(path) {
            Arc::new(PdfTextExtractor)
        } else {
            Arc::new(PlainTextExtractor)
        };
        let ingestor = Ingestor::new(store.clone(), embedder.clone(), extractor, chunker.clone());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let report = ingestor
            .ingest(
                NewDocument {
                    course_id: cli.course.clone(),
                    file_name,
                    file_size: bytes.len() as u64,
                    uploaded_by: "cli".to_string(),
                },
                bytes,
            )
            .await?;
        println!(
            "ingested {} ({} chunks)",
            report.document.file_name, report.chunks
        );
    }

    let composer = AnswerComposer::new(Retriever::new(store, embedder), provider);
    if let Some(query) = &cli.query {
        let results = composer
            .retriever()
            .search(query, &cli.course, cli.top_k)
            .await;
        println!("--- Retrieved Context ---\n{}", build_context(&results));
        if cli.dry_run {
            println!("dry-run enabled; skipping answer.");
        } else {
            let answer = composer.answer(query, &cli.course, "cli").await;
            println!("--- Answer ---\n{answer}");
        }
    }
    if cli.study_questions {
        println!("--- Study Questions ---");
        for (idx, question) in composer.study_questions(&cli.course).await.iter().enumerate() {
            println!("{}. {}", idx + 1, question);
        }
    }
    Ok(())
}

fn is_pdf(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
