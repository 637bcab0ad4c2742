//! Text extraction from uploaded documents.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

/// Only accepted upload content type.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Turns raw upload bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts the document's text.
    async fn extract(&self, bytes: Vec<u8>) -> Result<String>;
}

/// PDF extractor backed by `pdf-extract`, run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String> {
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|err| anyhow!("pdf extraction task join error: {err}"))?
            .context("failed to extract text from PDF")?;
        Ok(text)
    }
}

/// Extractor that treats the upload as UTF-8 text. Used by the CLI for `.txt`
/// inputs and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String> {
        String::from_utf8(bytes).context("document is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_pdf_is_an_error() {
        let err = PdfTextExtractor
            .extract(b"definitely not a pdf".to_vec())
            .await
            .expect_err("garbage should not parse");
        assert!(err.to_string().to_lowercase().contains("pdf"));
    }

    #[tokio::test]
    async fn plain_text_round_trips() {
        let text = PlainTextExtractor
            .extract("Newton's laws".as_bytes().to_vec())
            .await
            .expect("utf8");
        assert_eq!(text, "Newton's laws");
    }
}
