//! Ingestion orchestration.
//!
//! Drives one document through extract → chunk → embed → store and owns
//! its status transitions:
//!
//! ```text
//! processing ──▶ ready   (chunks committed with chunk_count)
//!      │
//!      └──────▶ error   (chunks removed, error_message set)
//! ```
//!
//! Ingestion runs as a detached tokio task per document. Failures are
//! recorded on the document and logged; they never propagate to the caller
//! and are not retried.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{error, info};

use knowledge_core::chunk::{build_chunks, chunk_words};
use knowledge_core::models::{Document, DocumentStatus, FileType};
use knowledge_core::store::Store;
use knowledge_core::KnowledgeError;

use crate::config::ChunkingConfig;
use crate::extract::extract_text;
use crate::provider::ModelProvider;

/// A document accepted for ingestion.
pub struct AcceptedUpload {
    /// The document row as inserted, status `processing`.
    pub document: Document,
    /// Background ingestion task. Dropping it does not cancel ingestion.
    pub task: JoinHandle<DocumentStatus>,
}

/// Ingestion orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    provider: Arc<dyn ModelProvider>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn ModelProvider>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunking,
        }
    }

    /// Validate and record an upload, then start ingestion in the background.
    ///
    /// Unsupported extensions are rejected here with
    /// [`KnowledgeError::UnsupportedFormat`] before any row is written.
    pub async fn accept_upload(
        &self,
        tenant_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AcceptedUpload> {
        let file_type = FileType::from_filename(filename)?;
        let document = Document::new_processing(tenant_id, filename, file_type, bytes.len() as i64);
        self.store
            .insert_document(&document)
            .await
            .with_context(|| format!("failed to record upload {}", filename))?;

        info!(
            tenant_id,
            document_id = %document.id,
            filename,
            file_size = document.file_size,
            "upload accepted"
        );

        let ingestor = self.clone();
        let tenant_id = tenant_id.to_string();
        let document_id = document.id.clone();
        let filename = filename.to_string();
        let task = tokio::spawn(async move {
            ingestor
                .ingest_document(&tenant_id, &document_id, &bytes, &filename)
                .await
        });

        Ok(AcceptedUpload { document, task })
    }

    /// Run the full pipeline for one document and return its final status.
    ///
    /// Never fails: any error marks the document `error` with the message.
    pub async fn ingest_document(
        &self,
        tenant_id: &str,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
    ) -> DocumentStatus {
        info!(tenant_id, document_id, filename, "ingestion started");

        match self.run_pipeline(tenant_id, document_id, bytes, filename).await {
            Ok(chunks) => {
                info!(tenant_id, document_id, chunks, "document ready");
                DocumentStatus::Ready
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(tenant_id, document_id, error = %message, "ingestion failed");
                if let Err(e) = self.store.fail_document(document_id, &message).await {
                    error!(document_id, error = %e, "failed to record ingestion error");
                }
                DocumentStatus::Error
            }
        }
    }

    async fn run_pipeline(
        &self,
        tenant_id: &str,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<usize> {
        self.store.begin_processing(document_id).await?;

        // PDF parsing is CPU-bound; keep it off the async workers.
        let owned = bytes.to_vec();
        let name = filename.to_string();
        let text = tokio::task::spawn_blocking(move || extract_text(&owned, &name))
            .await
            .context("extraction task panicked")??;

        if text.trim().is_empty() {
            return Err(KnowledgeError::EmptyExtraction.into());
        }

        let texts = chunk_words(&text, self.chunking.size, self.chunking.overlap)?;
        if texts.is_empty() {
            return Err(KnowledgeError::EmptyExtraction.into());
        }

        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(KnowledgeError::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }

        let chunks = build_chunks(tenant_id, document_id, &texts, vectors);
        self.store
            .complete_document(document_id, &chunks)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("{:#}", e)))?;

        Ok(chunks.len())
    }
}
