//! Core data models used throughout the knowledge pipeline.
//!
//! These types represent the documents, chunks, rules, and retrieval
//! results that flow through ingestion and answering.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::KnowledgeError;

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "error" => Ok(DocumentStatus::Error),
            other => anyhow::bail!("unknown document status: {}", other),
        }
    }
}

/// Document format, detected purely from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
}

impl FileType {
    /// Detect the format from a filename (case-insensitive).
    ///
    /// `doc` is routed to the DOCX reader.
    pub fn from_filename(filename: &str) -> Result<Self, KnowledgeError> {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        };
        match ext.as_str() {
            "pdf" => Ok(FileType::Pdf),
            "docx" | "doc" => Ok(FileType::Docx),
            _ => Err(KnowledgeError::UnsupportedFormat(ext)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            other => anyhow::bail!("unknown file type: {}", other),
        }
    }
}

/// An uploaded knowledge document owned by a tenant.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub error_message: Option<String>,
    pub created_at: i64,
}

impl Document {
    /// A freshly accepted document, not yet ingested.
    pub fn new_processing(
        tenant_id: &str,
        filename: &str,
        file_type: FileType,
        file_size: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            filename: filename.to_string(),
            file_type,
            file_size,
            status: DocumentStatus::Processing,
            chunk_count: 0,
            error_message: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A word-window slice of a document's text with its embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub tenant_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
    pub embedding: Vec<f32>,
}

/// An operator-authored trigger → response pair.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeRule {
    pub id: String,
    pub tenant_id: String,
    pub trigger: String,
    pub response: String,
    /// `true` = whole-message match, `false` = substring match.
    pub is_exact_match: bool,
    /// Unix time in microseconds.
    pub created_at: i64,
    /// Insertion sequence assigned by the store; breaks `created_at` ties.
    /// Zero until the rule has been stored.
    pub seq: i64,
}

impl KnowledgeRule {
    pub fn new(tenant_id: &str, trigger: &str, response: &str, is_exact_match: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            trigger: trigger.to_string(),
            response: response.to_string(),
            is_exact_match,
            created_at: chrono::Utc::now().timestamp_micros(),
            seq: 0,
        }
    }
}

/// A chunk returned from similarity search. Not persisted.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// `1 - cosine_distance`; 1.0 means identical direction.
    pub similarity: f64,
}
