//! Storage abstraction for the knowledge pipeline.
//!
//! The [`Store`] trait covers everything ingestion and answering need:
//! document lifecycle, chunk persistence, tenant-scoped similarity search,
//! and operator rules. Backends: SQLite (app crate) and [`memory`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Searchability
//!
//! Only chunks of documents whose status is `ready` are visible to
//! [`Store::count_searchable_chunks`] and [`Store::vector_search`].
//! [`Store::complete_document`] writes chunks and flips the status in one
//! step, and [`Store::fail_document`] removes whatever was written, so a
//! half-ingested document never leaks into answers.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Ordering;

use crate::models::{Chunk, Document, KnowledgeRule, ScoredChunk};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](Store::insert_document) | Record an accepted upload |
/// | [`begin_processing`](Store::begin_processing) | Reset a document before (re-)ingestion |
/// | [`complete_document`](Store::complete_document) | Store chunks and mark ready |
/// | [`fail_document`](Store::fail_document) | Drop chunks and mark error |
/// | [`vector_search`](Store::vector_search) | Tenant-scoped cosine search |
/// | [`list_rules`](Store::list_rules) | Tenant rules in matcher order |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new document row.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Fetch a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// All documents of a tenant, oldest first.
    async fn list_documents(&self, tenant_id: &str) -> Result<Vec<Document>>;

    /// Set status `processing`, clear count and error, drop existing chunks.
    async fn begin_processing(&self, doc_id: &str) -> Result<()>;

    /// Replace the document's chunks and mark it `ready` with
    /// `chunk_count = chunks.len()`, atomically.
    async fn complete_document(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Remove the document's chunks and mark it `error` with `message`.
    async fn fail_document(&self, doc_id: &str, message: &str) -> Result<()>;

    /// Delete a document and, by cascade, its chunks. Returns whether it existed.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Number of chunks of `ready` documents owned by the tenant.
    async fn count_searchable_chunks(&self, tenant_id: &str) -> Result<i64>;

    /// Top `limit` chunks of the tenant by cosine similarity to `query_vec`,
    /// ordered as described in [`rank_candidates`].
    async fn vector_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Insert an operator rule.
    /// Insert a rule. The store assigns its insertion sequence; `rule.seq`
    /// is ignored.
    async fn insert_rule(&self, rule: &KnowledgeRule) -> Result<()>;

    /// All rules of the tenant, by creation time, then insertion sequence,
    /// then id.
    async fn list_rules(&self, tenant_id: &str) -> Result<Vec<KnowledgeRule>>;

    /// Delete a tenant's rule. Returns whether it existed.
    async fn delete_rule(&self, tenant_id: &str, id: &str) -> Result<bool>;
}

/// Order candidates best-first and keep the top `limit`.
///
/// Similarity descending; ties go to the lower chunk index, then the lower
/// document id.
pub fn rank_candidates(mut candidates: Vec<ScoredChunk>, limit: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    candidates.truncate(limit);
    candidates
}
