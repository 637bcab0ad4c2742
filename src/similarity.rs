//! Cosine similarity between embedding vectors.

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns 0 when the lengths differ or either vector has zero magnitude, so
/// vectors produced by different embedding methods simply never match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }
    (dot / magnitude).clamp(-1.0, 1.0)
}
