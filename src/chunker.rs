//! Word-window chunking of extracted document text.

use serde::Serialize;

/// Default number of words per chunk.
pub const DEFAULT_CHUNK_WORDS: usize = 500;

/// Chunking tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Words per chunk window. Zero is treated as one.
    pub words_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: DEFAULT_CHUNK_WORDS,
        }
    }
}

/// Chunk emitted for embedding and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Zero-based ordinal within the document.
    pub index: usize,
    /// Window words joined by single spaces.
    pub text: String,
    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,
}

/// Stateless splitter that partitions text into non-overlapping word windows.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Builds a chunker with the provided config.
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Returns the underlying config reference.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Splits `text` into consecutive windows of `words_per_chunk` words.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        chunk_words(text, self.config.words_per_chunk)
    }
}

/// Splits on whitespace into windows of `words_per_chunk` words, dropping empty windows.
pub fn chunk_words(text: &str, words_per_chunk: usize) -> Vec<TextChunk> {
    let window = words_per_chunk.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::with_capacity(words.len().div_ceil(window));
    for slice in words.chunks(window) {
        let joined = slice.join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            continue;
        }
        chunks.push(TextChunk {
            index: chunks.len(),
            text: trimmed.to_string(),
            word_count: trimmed.split_whitespace().count(),
        });
    }
    chunks
}
