//! In-memory [`Store`] implementation for tests and embedding the core
//! without a database.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over the tenant's ready chunks.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Document, DocumentStatus, KnowledgeRule, ScoredChunk};
use crate::rules::sort_rules;

use super::{rank_candidates, Store};

/// In-memory store.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    rules: RwLock<Vec<KnowledgeRule>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Number of chunk rows owned by a document, regardless of status.
    pub fn chunk_rows(&self, doc_id: &str) -> usize {
        self.chunks
            .read()
            .map(|c| c.iter().filter(|c| c.document_id == doc_id).count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl InMemoryStore {
    fn update_doc(&self, doc_id: &str, f: impl FnOnce(&mut Document)) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let doc = docs
            .get_mut(doc_id)
            .ok_or_else(|| anyhow!("document not found: {}", doc_id))?;
        f(doc);
        Ok(())
    }

    fn ready_docs(&self, tenant_id: &str) -> Result<Vec<String>> {
        Ok(read(&self.docs)?
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.status == DocumentStatus::Ready)
            .map(|d| d.id.clone())
            .collect())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut docs = write(&self.docs)?;
        if docs.contains_key(&doc.id) {
            anyhow::bail!("document already exists: {}", doc.id);
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.docs)?.get(id).cloned())
    }

    async fn list_documents(&self, tenant_id: &str) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = read(&self.docs)?
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn begin_processing(&self, doc_id: &str) -> Result<()> {
        self.update_doc(doc_id, |d| {
            d.status = DocumentStatus::Processing;
            d.chunk_count = 0;
            d.error_message = None;
        })?;
        write(&self.chunks)?.retain(|c| c.document_id != doc_id);
        Ok(())
    }

    async fn complete_document(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()> {
        // Hold both locks so readers never see chunks without the ready flag.
        let mut docs = write(&self.docs)?;
        let mut stored = write(&self.chunks)?;
        let doc = docs
            .get_mut(doc_id)
            .ok_or_else(|| anyhow!("document not found: {}", doc_id))?;
        stored.retain(|c| c.document_id != doc_id);
        stored.extend(chunks.iter().cloned());
        doc.status = DocumentStatus::Ready;
        doc.chunk_count = chunks.len() as i64;
        doc.error_message = None;
        Ok(())
    }

    async fn fail_document(&self, doc_id: &str, message: &str) -> Result<()> {
        write(&self.chunks)?.retain(|c| c.document_id != doc_id);
        self.update_doc(doc_id, |d| {
            d.status = DocumentStatus::Error;
            d.chunk_count = 0;
            d.error_message = Some(message.to_string());
        })
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let existed = write(&self.docs)?.remove(id).is_some();
        write(&self.chunks)?.retain(|c| c.document_id != id);
        Ok(existed)
    }

    async fn count_searchable_chunks(&self, tenant_id: &str) -> Result<i64> {
        let ready = self.ready_docs(tenant_id)?;
        let count = read(&self.chunks)?
            .iter()
            .filter(|c| c.tenant_id == tenant_id && ready.contains(&c.document_id))
            .count();
        Ok(count as i64)
    }

    async fn vector_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let ready = self.ready_docs(tenant_id)?;
        let candidates: Vec<ScoredChunk> = read(&self.chunks)?
            .iter()
            .filter(|c| c.tenant_id == tenant_id && ready.contains(&c.document_id))
            .map(|c| ScoredChunk {
                chunk_id: c.id.clone(),
                document_id: c.document_id.clone(),
                chunk_index: c.chunk_index,
                text: c.text.clone(),
                similarity: cosine_similarity(query_vec, &c.embedding) as f64,
            })
            .collect();
        Ok(rank_candidates(candidates, limit))
    }

    async fn insert_rule(&self, rule: &KnowledgeRule) -> Result<()> {
        let mut rules = write(&self.rules)?;
        let mut stored = rule.clone();
        stored.seq = rules.iter().map(|r| r.seq).max().unwrap_or(0) + 1;
        rules.push(stored);
        Ok(())
    }

    async fn list_rules(&self, tenant_id: &str) -> Result<Vec<KnowledgeRule>> {
        let mut rules: Vec<KnowledgeRule> = read(&self.rules)?
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        sort_rules(&mut rules);
        Ok(rules)
    }

    async fn delete_rule(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let mut rules = write(&self.rules)?;
        let before = rules.len();
        rules.retain(|r| !(r.tenant_id == tenant_id && r.id == id));
        Ok(rules.len() != before)
    }
}
