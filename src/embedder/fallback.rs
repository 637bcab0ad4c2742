//! Deterministic local embedding used when no embedding API is available.

use std::collections::HashMap;

use crate::tokenize::split_words;

/// Dimensionality of fallback vectors.
pub const FALLBACK_DIMENSIONS: usize = 100;

const FREQUENCY_SLOTS: usize = 50;
const LENGTH_SLOT: usize = 50;
const WORD_COUNT_SLOT: usize = 51;
const DIGIT_DENSITY_SLOT: usize = 52;
const UPPERCASE_DENSITY_SLOT: usize = 53;

/// Builds the 100-dimensional word-frequency vector for `text`.
///
/// Slots 0-49 hold the normalized frequency of the first 50 distinct words
/// longer than two characters, in first-seen order. Slots 50-53 hold the
/// length, word count, digit density and uppercase density. Never fails.
pub fn fallback_embedding(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    let words = split_words(&lowered);
    let word_total = words.len() as f64;

    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for word in words.iter().copied().filter(|word| word.len() > 2) {
        let count = freq.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut embedding = vec![0.0f32; FALLBACK_DIMENSIONS];
    for (slot, word) in order.iter().take(FREQUENCY_SLOTS).enumerate() {
        embedding[slot] = (freq[word] as f64 / word_total) as f32;
    }

    let char_total = text.chars().count();
    let digits = text.chars().filter(|ch| ch.is_ascii_digit()).count();
    let uppercase = text.chars().filter(|ch| ch.is_ascii_uppercase()).count();
    embedding[LENGTH_SLOT] = (char_total as f64 / 1000.0) as f32;
    embedding[WORD_COUNT_SLOT] = (word_total / 100.0) as f32;
    embedding[DIGIT_DENSITY_SLOT] = density(digits, char_total);
    embedding[UPPERCASE_DENSITY_SLOT] = density(uppercase, char_total);
    embedding
}

fn density(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64) as f32
    }
}
