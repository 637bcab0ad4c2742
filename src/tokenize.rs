//! Separator-run splitting shared by the fallback embedder and the extractive composer.
//!
//! Both helpers treat a run of separator characters as a single boundary and keep
//! the (possibly empty) leading and trailing pieces, so `" a "` yields `["", "a", ""]`.

/// ASCII word character (`[A-Za-z0-9_]`).
pub fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Splits `text` on runs of non-word characters.
pub fn split_words(text: &str) -> Vec<&str> {
    split_runs(text, |ch| !is_word_char(ch))
}

/// Splits `text` into sentences on runs of `.`, `!` and `?`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    split_runs(text, |ch| matches!(ch, '.' | '!' | '?'))
}

fn split_runs<F>(text: &str, is_separator: F) -> Vec<&str>
where
    F: Fn(char) -> bool,
{
    let pieces: Vec<&str> = text.split(|ch: char| is_separator(ch)).collect();
    let last = pieces.len() - 1;
    pieces
        .into_iter()
        .enumerate()
        .filter(|(idx, piece)| *idx == 0 || *idx == last || !piece.is_empty())
        .map(|(_, piece)| piece)
        .collect()
}
