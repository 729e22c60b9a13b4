//! Document listing and removal for `kb documents`.
//!
//! Shows each upload's ingestion status so operators can see which files
//! are searchable and why a failed one failed.

use anyhow::{bail, Result};
use serde::Serialize;

use knowledge_core::models::{Document, DocumentStatus};
use knowledge_core::store::Store;

/// Aggregate counts for one tenant.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct TenantSummary {
    pub documents: usize,
    pub ready: usize,
    pub processing: usize,
    pub failed: usize,
    pub searchable_chunks: i64,
}

pub async fn summarize(store: &dyn Store, tenant_id: &str) -> Result<(Vec<Document>, TenantSummary)> {
    let docs = store.list_documents(tenant_id).await?;
    let mut summary = TenantSummary {
        documents: docs.len(),
        searchable_chunks: store.count_searchable_chunks(tenant_id).await?,
        ..TenantSummary::default()
    };
    for doc in &docs {
        match doc.status {
            DocumentStatus::Ready => summary.ready += 1,
            DocumentStatus::Processing => summary.processing += 1,
            DocumentStatus::Error => summary.failed += 1,
        }
    }
    Ok((docs, summary))
}

/// Delete a document and its chunks.
pub async fn delete_document(store: &dyn Store, document_id: &str) -> Result<()> {
    if !store.delete_document(document_id).await? {
        bail!("document not found: {}", document_id);
    }
    tracing::info!(document_id, "document deleted");
    Ok(())
}

#[derive(Serialize)]
struct DocumentListing<'a> {
    tenant_id: &'a str,
    summary: &'a TenantSummary,
    documents: &'a [Document],
}

/// Render the listing as pretty-printed JSON for `kb documents list --json`.
pub fn documents_json(tenant_id: &str, docs: &[Document], summary: &TenantSummary) -> Result<String> {
    let listing = DocumentListing {
        tenant_id,
        summary,
        documents: docs,
    };
    Ok(serde_json::to_string_pretty(&listing)?)
}

pub fn print_documents(tenant_id: &str, docs: &[Document], summary: &TenantSummary) {
    println!("Tenant {}", tenant_id);
    println!(
        "  {} documents ({} ready, {} processing, {} failed), {} searchable chunks",
        summary.documents, summary.ready, summary.processing, summary.failed, summary.searchable_chunks
    );
    if docs.is_empty() {
        return;
    }
    println!();

    for doc in docs {
        println!(
            "  {}  {:<10} {:>6} chunks  {:>9}  {}  {}",
            doc.id,
            doc.status.as_str(),
            doc.chunk_count,
            format_bytes(doc.file_size.max(0) as u64),
            format_ts_iso(doc.created_at),
            doc.filename
        );
        if let Some(err) = &doc.error_message {
            println!("      error: {}", err);
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::chunk::build_chunks;
    use knowledge_core::models::FileType;
    use knowledge_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn summary_counts_each_status() {
        let store = InMemoryStore::new();
        let ready = Document::new_processing("t1", "a.pdf", FileType::Pdf, 10);
        let failed = Document::new_processing("t1", "b.docx", FileType::Docx, 10);
        let pending = Document::new_processing("t1", "c.docx", FileType::Docx, 10);
        for doc in [&ready, &failed, &pending] {
            store.insert_document(doc).await.unwrap();
        }
        let chunks = build_chunks("t1", &ready.id, &["x".to_string(), "y".to_string()], vec![vec![1.0]; 2]);
        store.complete_document(&ready.id, &chunks).await.unwrap();
        store.fail_document(&failed.id, "boom").await.unwrap();

        let (docs, summary) = summarize(&store, "t1").await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(
            summary,
            TenantSummary {
                documents: 3,
                ready: 1,
                processing: 1,
                failed: 1,
                searchable_chunks: 2,
            }
        );
    }

    #[tokio::test]
    async fn json_listing_carries_status_and_error() {
        let store = InMemoryStore::new();
        let doc = Document::new_processing("t1", "b.docx", FileType::Docx, 10);
        store.insert_document(&doc).await.unwrap();
        store.fail_document(&doc.id, "boom").await.unwrap();

        let (docs, summary) = summarize(&store, "t1").await.unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&documents_json("t1", &docs, &summary).unwrap()).unwrap();
        assert_eq!(json["tenant_id"], "t1");
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["documents"][0]["status"], "error");
        assert_eq!(json["documents"][0]["file_type"], "docx");
        assert_eq!(json["documents"][0]["error_message"], "boom");
    }

    #[tokio::test]
    async fn deleting_unknown_document_fails() {
        let store = InMemoryStore::new();
        assert!(delete_document(&store, "nope").await.is_err());
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
