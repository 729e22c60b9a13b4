//! Vector helpers shared by every store backend.
//!
//! Embeddings are persisted as little-endian `f32` BLOBs and compared with
//! cosine similarity. Two vectors are only comparable when they come from
//! the same model and dimension; mismatched lengths score `0.0`.

use crate::error::KnowledgeError;

/// Encode an embedding as a BLOB of `len × 4` little-endian bytes.
///
/// ```rust
/// use knowledge_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.5f32, -1.25];
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial words are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`, i.e. `1 - cosine_distance`.
///
/// Returns `0.0` for empty vectors, zero vectors, or a length mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Verify that a provider returned vectors of the configured dimension.
pub fn check_dims(vectors: &[Vec<f32>], dims: usize) -> Result<(), KnowledgeError> {
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
        return Err(KnowledgeError::EmbeddingProvider(format!(
            "embedding {} has dimension {}, expected {}",
            i,
            v.len(),
            dims
        )));
    }
    Ok(())
}
