//! Grounded answers and study questions built from retrieved course chunks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::llm::{complete_blocking, CompletionRequest, LlmProvider};
use crate::retriever::{Retriever, SearchResult};
use crate::tokenize::{split_sentences, split_words};

/// Answer returned when the course has no matching chunks.
pub const NO_DOCUMENTS_MESSAGE: &str = "I couldn't find any relevant documents for your question. Please make sure course materials have been uploaded, or try asking a different question.";

/// Answer returned by the extractive path when it is handed no chunks.
pub const FALLBACK_NO_DOCUMENTS_MESSAGE: &str = "I couldn't find any relevant documents for your question. Please make sure course materials have been uploaded.";

/// Substituted when the provider returns an empty completion.
pub const EMPTY_COMPLETION_MESSAGE: &str =
    "I couldn't generate a response at the moment. Please try again.";

/// Query used to pull representative chunks for study questions.
pub const STUDY_QUESTION_QUERY: &str = "important concepts definitions key points";

/// Chunks consulted per answer.
pub const ANSWER_CONTEXT_CHUNKS: usize = 3;

const STUDY_QUESTION_CHUNKS: usize = 5;
const MAX_STUDY_QUESTIONS: usize = 5;
const FALLBACK_SOURCES: usize = 2;

const ANSWER_SYSTEM_PROMPT: &str = "You are an AI teaching assistant. Answer the student's question using ONLY the provided course documents. Be helpful, accurate, and cite which document you're referencing. If the documents don't contain enough information to answer the question, say so clearly.";

const STUDY_QUESTION_SYSTEM_PROMPT: &str = "Generate 5 study questions based on the course content provided. Make them thought-provoking and educational.";

/// Questions offered for a course without any processed material.
pub const EMPTY_COURSE_QUESTIONS: [&str; 3] = [
    "What are the main topics covered in this course?",
    "Can you explain the key concepts we've studied?",
    "What should I review for the upcoming assessment?",
];

/// Content-independent study questions.
pub const GENERIC_STUDY_QUESTIONS: [&str; 5] = [
    "What are the key concepts discussed in the course materials?",
    "How would you explain the main ideas in your own words?",
    "What examples are provided to illustrate these concepts?",
    "What connections can you make between different topics?",
    "How might these concepts apply in real-world situations?",
];

const TERM_QUESTION_TEMPLATES: [&str; 5] = [
    "What does \"{term}\" mean in the context of the course materials?",
    "How would you explain {term} in your own words?",
    "What examples in the materials illustrate {term}?",
    "How does {term} connect to the other topics covered?",
    "How might {term} apply in a real-world situation?",
];

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "among", "because", "been", "before", "being",
    "below", "between", "both", "cannot", "could", "does", "doing", "down", "during", "each",
    "every", "from", "further", "have", "having", "here", "into", "itself", "just", "like",
    "many", "more", "most", "much", "must", "only", "other", "over", "same", "should", "some",
    "such", "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "under", "until", "upon", "very", "were", "what", "when", "where", "which",
    "while", "with", "within", "without", "would", "your",
];

/// Builds answers from the retriever's top chunks, with or without a completion provider.
#[derive(Clone)]
pub struct AnswerComposer {
    retriever: Retriever,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl AnswerComposer {
    /// Creates a composer; `provider = None` always uses the extractive path.
    pub fn new(retriever: Retriever, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            retriever,
            provider,
        }
    }

    /// Underlying retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answers `query` from the material of `course_id`.
    pub async fn answer(&self, query: &str, course_id: &str, user_id: &str) -> String {
        let docs = self
            .retriever
            .search(query, course_id, ANSWER_CONTEXT_CHUNKS)
            .await;
        if docs.is_empty() {
            tracing::info!(course_id, user_id, "no course chunks matched");
            return NO_DOCUMENTS_MESSAGE.to_string();
        }
        let Some(provider) = &self.provider else {
            return fallback_answer(query, &docs);
        };

        let request = CompletionRequest::new(
            format!(
                "{ANSWER_SYSTEM_PROMPT}\n\nContext from course documents:\n{}",
                build_context(&docs)
            ),
            query,
            0.3,
            500,
        );
        match complete_blocking(provider.clone(), request).await {
            Ok(completion) => {
                let mut answer = if completion.trim().is_empty() {
                    EMPTY_COMPLETION_MESSAGE.to_string()
                } else {
                    completion
                };
                answer.push_str("\n\n📚 Sources:\n");
                answer.push_str(&format_sources(&docs));
                answer
            }
            Err(err) => {
                tracing::warn!(
                    provider = provider.name(),
                    course_id,
                    error = %err,
                    "completion failed; using extractive answer"
                );
                let docs = self
                    .retriever
                    .search(query, course_id, ANSWER_CONTEXT_CHUNKS)
                    .await;
                fallback_answer(query, &docs)
            }
        }
    }

    /// Up to five study questions for `course_id`.
    pub async fn study_questions(&self, course_id: &str) -> Vec<String> {
        let chunks = self
            .retriever
            .search(STUDY_QUESTION_QUERY, course_id, STUDY_QUESTION_CHUNKS)
            .await;
        if chunks.is_empty() {
            return EMPTY_COURSE_QUESTIONS.iter().map(|q| q.to_string()).collect();
        }
        let Some(provider) = &self.provider else {
            return questions_from_content(&chunks);
        };

        let context = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = CompletionRequest::new(
            STUDY_QUESTION_SYSTEM_PROMPT,
            format!("Course content:\n{context}"),
            0.7,
            300,
        );
        match complete_blocking(provider.clone(), request).await {
            Ok(completion) => non_empty_lines(&completion, MAX_STUDY_QUESTIONS),
            Err(err) => {
                tracing::warn!(provider = provider.name(), course_id, error = %err, "study question generation failed");
                GENERIC_STUDY_QUESTIONS.iter().map(|q| q.to_string()).collect()
            }
        }
    }
}

/// `Document {i} ({file}):\n{content}\n\n` for each result, 1-indexed.
pub fn build_context(docs: &[SearchResult]) -> String {
    docs.iter()
        .enumerate()
        .map(|(idx, doc)| format!("Document {} ({}):\n{}\n\n", idx + 1, doc.file_name, doc.content))
        .collect()
}

fn format_sources(docs: &[SearchResult]) -> String {
    docs.iter()
        .enumerate()
        .map(|(idx, doc)| format!("{}. {}", idx + 1, doc.file_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extractive answer: the sentence of the top chunk sharing the most query tokens.
pub fn fallback_answer(query: &str, docs: &[SearchResult]) -> String {
    let Some(top) = docs.first() else {
        return FALLBACK_NO_DOCUMENTS_MESSAGE.to_string();
    };
    let lowered_query = query.to_lowercase();
    let query_words = split_words(&lowered_query);

    let sentences = split_sentences(&top.content);
    let mut best = sentences.first().copied().unwrap_or_default();
    let mut best_score = 0usize;
    for sentence in sentences.iter().copied() {
        let lowered = sentence.to_lowercase();
        let words: HashSet<&str> = split_words(&lowered).into_iter().collect();
        let score = query_words.iter().filter(|word| words.contains(*word)).count();
        if score > best_score {
            best_score = score;
            best = sentence;
        }
    }

    let sources = format_sources(&docs[..docs.len().min(FALLBACK_SOURCES)]);
    format!(
        "Based on the course materials, here's what I found:\n\n{}\n\nFor more detailed information, please refer to the complete documents.\n\n📚 Sources:\n{}",
        best.trim(),
        sources
    )
}

/// Study questions built from the most frequent content terms, padded with generic ones.
pub fn questions_from_content(chunks: &[SearchResult]) -> Vec<String> {
    let terms = key_terms(chunks, MAX_STUDY_QUESTIONS);
    let mut questions: Vec<String> = terms
        .iter()
        .zip(TERM_QUESTION_TEMPLATES.iter())
        .map(|(term, template)| template.replace("{term}", term))
        .collect();
    for generic in GENERIC_STUDY_QUESTIONS.iter().skip(questions.len()) {
        questions.push(generic.to_string());
    }
    questions
}

/// Most frequent non-stop-words longer than three letters, ties in first-seen order.
pub fn key_terms(chunks: &[SearchResult], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut next = 0usize;
    for chunk in chunks {
        let lowered = chunk.content.to_lowercase();
        for word in split_words(&lowered) {
            if word.len() <= 3
                || !word.chars().all(|ch| ch.is_ascii_alphabetic())
                || STOP_WORDS.contains(&word)
            {
                continue;
            }
            let entry = counts.entry(word.to_string()).or_insert_with(|| {
                next += 1;
                (0, next)
            });
            entry.0 += 1;
        }
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(limit).map(|(term, _)| term).collect()
}

/// The first `limit` non-empty lines of `text`, trimmed.
pub fn non_empty_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}
