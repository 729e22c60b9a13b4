//! Word-window text chunker.
//!
//! Splits extracted document text into overlapping windows of a fixed
//! number of whitespace-delimited words. Boundaries are by word count only;
//! sentences and paragraphs are not respected.
//!
//! # Algorithm
//!
//! 1. Split the text on whitespace.
//! 2. Take a window of `size` words starting at word 0.
//! 3. Advance the window start by `size - overlap`.
//! 4. Stop after the first window that reaches the last word.
//!
//! For `N > overlap` words this yields `ceil((N - overlap) / (size - overlap))`
//! windows, and dropping the first `overlap` words of every window after the
//! first reconstructs the original word sequence.
//!
//! # Example
//!
//! ```rust
//! use knowledge_core::chunk::chunk_words;
//!
//! let chunks = chunk_words("A B C D E F", 3, 1).unwrap();
//! assert_eq!(chunks, vec!["A B C", "C D E", "E F"]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::KnowledgeError;
use crate::models::Chunk;

/// Default window size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default number of words shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Reject window parameters that would never advance.
pub fn validate_window(size: usize, overlap: usize) -> Result<(), KnowledgeError> {
    if size == 0 || overlap >= size {
        return Err(KnowledgeError::InvalidChunking { size, overlap });
    }
    Ok(())
}

/// Split text into overlapping word windows.
///
/// Empty or whitespace-only text yields an empty vector. Text with at most
/// `size` words yields exactly one window.
///
/// # Errors
///
/// [`KnowledgeError::InvalidChunking`] if `size == 0` or `overlap >= size`.
pub fn chunk_words(
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<String>, KnowledgeError> {
    validate_window(size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + size).min(words.len());
        let window = words[start..end].join(" ");
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Pair chunk texts with their vectors into [`Chunk`] records.
///
/// Indices are contiguous from 0 in input order. Each chunk gets a fresh
/// UUID and a SHA-256 of its text.
pub fn build_chunks(
    tenant_id: &str,
    document_id: &str,
    texts: &[String],
    vectors: Vec<Vec<f32>>,
) -> Vec<Chunk> {
    texts
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (text, embedding))| make_chunk(tenant_id, document_id, i as i64, text, embedding))
        .collect()
}

fn make_chunk(
    tenant_id: &str,
    document_id: &str,
    index: i64,
    text: &str,
    embedding: Vec<f32>,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        tenant_id: tenant_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
        embedding,
    }
}
