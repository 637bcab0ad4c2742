//! Course-agnostic tutoring chat and study recommendations.

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{complete_blocking, CompletionRequest, LlmProvider};

const CHAT_SYSTEM_PROMPT: &str = "You are an AI learning assistant for a university platform. You help students with their coursework, explain concepts clearly, provide study tips, and generate practice questions. Be helpful, encouraging, and educational. Keep responses concise but informative. If asked about specific subjects like mathematics, computer science, psychology, etc., provide accurate and detailed explanations suitable for university-level students.";

const RECOMMENDATION_SYSTEM_PROMPT: &str = "You are an AI study advisor. Generate 3 specific, actionable study recommendations based on the student's course progress.";

/// Reply used when the provider returns an empty completion.
pub const EMPTY_CHAT_MESSAGE: &str =
    "I'm sorry, I couldn't generate a response at the moment. Please try again.";

/// Recommendations used without a provider or when it fails.
pub const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Review your recent quiz performance and focus on weaker areas",
    "Schedule a study session for your upcoming assignments",
    "Practice with AI-generated questions for better understanding",
];

const CALCULUS_EXPLANATION: &str = "Derivatives measure the rate of change of a function. Think of it as how fast something is changing at any given moment. For example, if you're driving and your speedometer shows 60 mph, that's the derivative of your position with respect to time. The basic rules include: the derivative of x^n is n*x^(n-1), and the derivative of a constant is 0.";

const PSYCHOLOGY_EXPLANATION: &str = "In cognitive psychology, we study how people process information, including perception, memory, thinking, and problem-solving. The mind works like an information processing system, taking in data from the environment, processing it, and producing responses.";

const COMPUTING_EXPLANATION: &str = "Computer science combines mathematical rigor with creative problem-solving. Programming is about breaking down complex problems into smaller, manageable steps that a computer can execute. Start with understanding the problem, then design an algorithm, and finally implement it in code.";

const GENERIC_EXPLANATION: &str = "I'm here to help you learn! Feel free to ask me specific questions about your coursework, and I'll provide detailed explanations and examples to help you understand the concepts better.";

/// A course the student is enrolled in.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseProgress {
    /// Course title.
    pub title: String,
    /// Completion percentage.
    pub progress: f64,
}

/// Plain tutoring chat over an optional completion provider.
#[derive(Clone)]
pub struct Tutor {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl Tutor {
    /// Creates a tutor; without a provider every answer is canned.
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }

    /// Answers a free-form student message.
    pub async fn reply(&self, message: &str) -> String {
        let Some(provider) = &self.provider else {
            return fallback_reply(message);
        };
        let request = CompletionRequest::new(CHAT_SYSTEM_PROMPT, message, 0.7, 500);
        match complete_blocking(provider.clone(), request).await {
            Ok(text) if text.trim().is_empty() => EMPTY_CHAT_MESSAGE.to_string(),
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(provider = provider.name(), error = %err, "chat completion failed");
                fallback_reply(message)
            }
        }
    }

    /// Three study recommendations for the given enrolment.
    pub async fn recommendations(&self, courses: &[CourseProgress]) -> Vec<String> {
        let defaults = || -> Vec<String> {
            DEFAULT_RECOMMENDATIONS
                .iter()
                .map(|r| r.to_string())
                .collect()
        };
        let Some(provider) = &self.provider else {
            return defaults();
        };
        let enrolled = courses
            .iter()
            .map(|course| format!("{} ({}% complete)", course.title, course.progress))
            .collect::<Vec<_>>()
            .join(", ");
        let request = CompletionRequest::new(
            RECOMMENDATION_SYSTEM_PROMPT,
            format!("Student is enrolled in: {enrolled}. Generate study recommendations."),
            0.7,
            200,
        );
        match complete_blocking(provider.clone(), request).await {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(DEFAULT_RECOMMENDATIONS.len())
                .map(str::to_string)
                .collect(),
            Err(err) => {
                tracing::warn!(provider = provider.name(), error = %err, "recommendation completion failed");
                defaults()
            }
        }
    }
}

/// Canned reply: a hashed opening line plus a keyword-picked explanation.
pub fn fallback_reply(message: &str) -> String {
    let openings = [
        format!("I understand you're asking about: {message}. Let me help you with that concept."),
        format!(
            "That's a great question! Here's what I can tell you about {}.",
            message.to_lowercase()
        ),
        format!("Let me break down {message} for you in simpler terms."),
        format!("I'd be happy to help you understand {message} better. Here's an explanation:"),
    ];
    let opening = &openings[(fnv1a(message.as_bytes()) % openings.len() as u64) as usize];

    let lowered = message.to_lowercase();
    let explanation = if lowered.contains("derivative") || lowered.contains("calculus") {
        CALCULUS_EXPLANATION
    } else if lowered.contains("psychology") || lowered.contains("cognitive") {
        PSYCHOLOGY_EXPLANATION
    } else if lowered.contains("computer science") || lowered.contains("programming") {
        COMPUTING_EXPLANATION
    } else {
        GENERIC_EXPLANATION
    };
    format!("{opening} {explanation}")
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};

    struct Echo;

    impl LlmProvider for Echo {
        fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(format!("{}\n\nsecond\nthird\nfourth", request.prompt))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct Broken;

    impl LlmProvider for Broken {
        fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            bail!("unavailable")
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn fallback_is_deterministic() {
        let message = "Explain derivatives";
        assert_eq!(fallback_reply(message), fallback_reply(message));
    }

    #[test]
    fn fallback_picks_keyword_explanation() {
        assert!(fallback_reply("What is a derivative?").ends_with(CALCULUS_EXPLANATION));
        assert!(fallback_reply("Cognitive load").ends_with(PSYCHOLOGY_EXPLANATION));
        assert!(fallback_reply("intro to programming").ends_with(COMPUTING_EXPLANATION));
        assert!(fallback_reply("history of Rome").ends_with(GENERIC_EXPLANATION));
    }

    #[test]
    fn fallback_opening_mentions_message() {
        let reply = fallback_reply("photosynthesis");
        assert!(reply.contains("photosynthesis"));
    }

    #[tokio::test]
    async fn reply_uses_provider() {
        let tutor = Tutor::new(Some(Arc::new(Echo)));
        assert!(tutor.reply("hello").await.starts_with("hello"));
    }

    #[tokio::test]
    async fn reply_falls_back_on_failure() {
        let tutor = Tutor::new(Some(Arc::new(Broken)));
        assert_eq!(tutor.reply("calculus").await, fallback_reply("calculus"));
    }

    #[tokio::test]
    async fn recommendations_take_three_lines() {
        let tutor = Tutor::new(Some(Arc::new(Echo)));
        let courses = vec![CourseProgress {
            title: "Physics".into(),
            progress: 40.0,
        }];
        let recs = tutor.recommendations(&courses).await;
        assert_eq!(recs.len(), 3);
        assert_eq!(
            recs[0],
            "Student is enrolled in: Physics (40% complete). Generate study recommendations."
        );
        assert_eq!(recs[2], "third");
    }

    #[tokio::test]
    async fn recommendations_default_without_provider() {
        let recs = Tutor::new(None).recommendations(&[]).await;
        assert_eq!(recs, DEFAULT_RECOMMENDATIONS.map(String::from).to_vec());
        let recs = Tutor::new(Some(Arc::new(Broken))).recommendations(&[]).await;
        assert_eq!(recs.len(), 3);
    }
}
