//! Error taxonomy for the knowledge pipeline.
//!
//! Ingestion-side errors end up in a document's `error_message`; query-side
//! errors ([`Retrieval`](KnowledgeError::Retrieval),
//! [`Generation`](KnowledgeError::Generation)) are recovered by the responder
//! and never reach the end user. [`Configuration`](KnowledgeError::Configuration)
//! is the one kind that must stop the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// File extension is not one of `pdf`, `docx`, `doc`.
    #[error("unsupported file type: .{0}")]
    UnsupportedFormat(String),

    /// Extraction succeeded but produced no usable text.
    #[error("extracted text is empty")]
    EmptyExtraction,

    /// The document could not be parsed (corrupt PDF, not a ZIP, ...).
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Chunk window parameters that would never advance.
    #[error("invalid chunking parameters: size={size}, overlap={overlap} (overlap must be < size)")]
    InvalidChunking { size: usize, overlap: usize },

    /// Transport, auth, or quota failure from the embedding provider.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Similarity search failed at answer time.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Chat-completion call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Missing or invalid provider configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),
}
