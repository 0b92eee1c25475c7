// src/similarity.rs
//! Field-wise cosine similarity between component vector sets.

use crate::model::ComponentVectorSet;

/// Cosine similarity of two equal-length vectors; 0 when either has no magnitude.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Mean cosine similarity over the `fields` present in both sets with the
/// same non-zero length. Other fields are left out of the mean; no
/// qualifying field gives 0.
pub fn score_components<S: AsRef<str>>(
    left: &ComponentVectorSet,
    right: &ComponentVectorSet,
    fields: &[S],
) -> f64 {
    let mut total = 0.0;
    let mut compared = 0usize;
    for field in fields {
        let (Some(a), Some(b)) = (left.get(field.as_ref()), right.get(field.as_ref())) else {
            continue;
        };
        if a.len() != b.len() || a.is_empty() {
            continue;
        }
        total += cosine(a, b);
        compared += 1;
    }
    if compared == 0 {
        0.0
    } else {
        total / compared as f64
    }
}
