//! Pseudo-vector generation (deterministic character-sum placeholder).
//!
//! Not an embedding: every vector points the same direction and only its
//! magnitude depends on the text. Enough to give both backends something to
//! index and rank.

/// Dimension of every vector written to or queried from a backend.
pub const DIM: usize = 4;

/// Only characters starting before this UTF-8 byte offset contribute.
const PREFIX_BYTES: usize = 10;

/// Generate a 4-dimensional pseudo-vector from text.
///
/// Component `i` is the sum of the prefix's code points times `i + 1`,
/// divided by 1000, then the whole vector is divided by its squared
/// magnitude. Same input always yields the same output; empty input
/// yields the zero vector.
pub fn pseudo_vector(text: &str) -> [f32; DIM] {
    let prefix_sum: f32 = text
        .char_indices()
        .take_while(|(offset, _)| *offset < PREFIX_BYTES)
        .map(|(_, ch)| ch as u32 as f32)
        .sum();

    let mut vector = [0.0f32; DIM];
    for (i, v) in vector.iter_mut().enumerate() {
        *v = prefix_sum * (i + 1) as f32 / 1000.0;
    }

    let squared: f32 = vector.iter().map(|v| v * v).sum();
    if squared > 0.0 {
        for v in &mut vector {
            *v /= squared;
        }
    }
    vector
}
