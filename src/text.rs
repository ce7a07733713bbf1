// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Prompt featurization for the task pipeline.

use crate::config::EMBEDDING_DIM;

/// Whitespace tokenization.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

/// Lowercased word tokens: runs of alphanumerics and `_`.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

fn word_bucket(word: &str, dim: usize) -> usize {
    let mut hash: u32 = 0;
    for c in word.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(c as u32);
    }
    hash as usize % dim
}

/// Bag-of-hashed-words embedding of dimension `dim`, L2-normalized.
///
/// Word order does not matter. Text without words yields the zero vector.
pub fn embed_with_dim(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];
    if dim == 0 {
        return vector;
    }

    for word in words(text) {
        vector[word_bucket(&word, dim)] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

/// [`embed_with_dim`] at the default dimension.
pub fn embed(text: &str) -> Vec<f32> {
    embed_with_dim(text, EMBEDDING_DIM)
}
