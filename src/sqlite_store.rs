//! SQLite-backed [`Store`] implementation.
//!
//! Chunk vectors are stored inline in the `chunks` table as little-endian
//! f32 BLOBs. Similarity search loads the tenant's ready chunks and ranks
//! them in Rust with the same cosine and tie-break rules as the in-memory
//! store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use knowledge_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use knowledge_core::models::{Chunk, Document, DocumentStatus, KnowledgeRule, ScoredChunk};
use knowledge_core::store::{rank_candidates, Store};

/// SQLite implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const DOCUMENT_COLUMNS: &str = "id, tenant_id, filename, file_type, file_size, status, chunk_count, error_message, created_at";

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let file_type: String = row.get("file_type");
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        filename: row.get("filename"),
        file_type: file_type.parse()?,
        file_size: row.get("file_size"),
        status: status.parse()?,
        chunk_count: row.get("chunk_count"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
    })
}

fn row_to_rule(row: &SqliteRow) -> KnowledgeRule {
    KnowledgeRule {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        trigger: row.get("trigger_phrase"),
        response: row.get("response"),
        is_exact_match: row.get("is_exact_match"),
        created_at: row.get("created_at"),
        seq: row.get("seq"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, filename, file_type, file_size,
                                   status, chunk_count, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.tenant_id)
        .bind(&doc.filename)
        .bind(doc.file_type.as_str())
        .bind(doc.file_size)
        .bind(doc.status.as_str())
        .bind(doc.chunk_count)
        .bind(&doc.error_message)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self, tenant_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn begin_processing(&self, doc_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            "UPDATE documents SET status = ?, chunk_count = 0, error_message = NULL WHERE id = ?",
        )
        .bind(DocumentStatus::Processing.as_str())
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            anyhow::bail!("document not found: {}", doc_id);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn complete_document(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, tenant_id, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(doc_id)
            .bind(&chunk.tenant_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert chunk {} of {}", chunk.chunk_index, doc_id))?;
        }

        let updated = sqlx::query(
            "UPDATE documents SET status = ?, chunk_count = ?, error_message = NULL WHERE id = ?",
        )
        .bind(DocumentStatus::Ready.as_str())
        .bind(chunks.len() as i64)
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            anyhow::bail!("document not found: {}", doc_id);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fail_document(&self, doc_id: &str, message: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            "UPDATE documents SET status = ?, chunk_count = 0, error_message = ? WHERE id = ?",
        )
        .bind(DocumentStatus::Error.as_str())
        .bind(message)
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            anyhow::bail!("document not found: {}", doc_id);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_searchable_chunks(&self, tenant_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.tenant_id = ? AND d.status = 'ready'
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn vector_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.text, c.embedding
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.tenant_id = ? AND d.status = 'ready'
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    similarity: cosine_similarity(query_vec, &vec) as f64,
                }
            })
            .collect();

        Ok(rank_candidates(candidates, limit))
    }

    async fn insert_rule(&self, rule: &KnowledgeRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_rules (id, tenant_id, trigger_phrase, response, is_exact_match, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.tenant_id)
        .bind(&rule.trigger)
        .bind(&rule.response)
        .bind(rule.is_exact_match)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_rules(&self, tenant_id: &str) -> Result<Vec<KnowledgeRule>> {
        let rows = sqlx::query(
            r#"
            SELECT rowid AS seq, id, tenant_id, trigger_phrase, response, is_exact_match, created_at
            FROM knowledge_rules
            WHERE tenant_id = ?
            ORDER BY created_at ASC, rowid ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_rule).collect())
    }

    async fn delete_rule(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM knowledge_rules WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use knowledge_core::chunk::build_chunks;
    use knowledge_core::models::FileType;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_db_path(tmp.path().join("kb.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    async fn add_ready_doc(store: &SqliteStore, tenant: &str, texts: &[&str], vecs: Vec<Vec<f32>>) -> String {
        let doc = Document::new_processing(tenant, "faq.docx", FileType::Docx, 42);
        store.insert_document(&doc).await.unwrap();
        let texts: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let chunks = build_chunks(tenant, &doc.id, &texts, vecs);
        store.complete_document(&doc.id, &chunks).await.unwrap();
        doc.id
    }

    #[tokio::test]
    async fn document_lifecycle_round_trips() {
        let (_tmp, store) = setup().await;
        let doc = Document::new_processing("t1", "Guide.PDF", FileType::Pdf, 1234);
        store.insert_document(&doc).await.unwrap();

        let loaded = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processing);
        assert_eq!(loaded.file_type, FileType::Pdf);
        assert_eq!(loaded.file_size, 1234);
        assert_eq!(loaded.filename, "Guide.PDF");

        store.fail_document(&doc.id, "provider down").await.unwrap();
        let loaded = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Error);
        assert_eq!(loaded.error_message.as_deref(), Some("provider down"));

        store.begin_processing(&doc.id).await.unwrap();
        let loaded = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processing);
        assert!(loaded.error_message.is_none());

        assert!(store.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_unknown_document_is_an_error() {
        let (_tmp, store) = setup().await;
        let err = store.fail_document("missing", "boom").await.unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }

    #[tokio::test]
    async fn complete_document_stores_chunks_and_count() {
        let (_tmp, store) = setup().await;
        let doc_id = add_ready_doc(&store, "t1", &["a", "b", "c"], vec![vec![1.0, 0.0]; 3]).await;

        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(doc.chunk_count, 3);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(&doc_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(store.count_searchable_chunks("t1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn vector_search_is_tenant_scoped() {
        let (_tmp, store) = setup().await;
        add_ready_doc(&store, "tenant-a", &["shipping policy"], vec![vec![1.0, 0.0]]).await;
        add_ready_doc(&store, "tenant-b", &["shipping policy"], vec![vec![1.0, 0.0]]).await;

        let results = store.vector_search("tenant-a", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        let owner = store.get_document(&results[0].document_id).await.unwrap().unwrap();
        assert_eq!(owner.tenant_id, "tenant-a");

        assert!(store.vector_search("tenant-c", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vector_search_ranks_and_limits() {
        let (_tmp, store) = setup().await;
        add_ready_doc(
            &store,
            "t1",
            &["orthogonal", "exact", "diagonal"],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        )
        .await;

        let results = store.vector_search("t1", &[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "diagonal"]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert!((results[1].similarity - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[tokio::test]
    async fn non_ready_documents_are_hidden() {
        let (_tmp, store) = setup().await;
        let doc_id = add_ready_doc(&store, "t1", &["a"], vec![vec![1.0]]).await;
        store.begin_processing(&doc_id).await.unwrap();
        assert_eq!(store.count_searchable_chunks("t1").await.unwrap(), 0);
        assert!(store.vector_search("t1", &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_document_cascades_to_chunks() {
        let (_tmp, store) = setup().await;
        let doc_id = add_ready_doc(&store, "t1", &["a", "b"], vec![vec![1.0]; 2]).await;

        assert!(store.delete_document(&doc_id).await.unwrap());
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert!(!store.delete_document(&doc_id).await.unwrap());
    }

    #[tokio::test]
    async fn rules_round_trip_in_creation_order() {
        let (_tmp, store) = setup().await;
        let mut second = KnowledgeRule::new("t1", "Parking", "Behind the shop", false);
        second.created_at = 20;
        let mut first = KnowledgeRule::new("t1", "hours", "9 to 5", true);
        first.created_at = 10;
        store.insert_rule(&second).await.unwrap();
        store.insert_rule(&first).await.unwrap();
        store
            .insert_rule(&KnowledgeRule::new("t2", "hours", "never", true))
            .await
            .unwrap();

        let rules = store.list_rules("t1").await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].trigger, "hours");
        assert!(rules[0].is_exact_match);
        assert_eq!(rules[1].trigger, "Parking");
        assert!(!rules[1].is_exact_match);

        assert!(store.delete_rule("t1", &first.id).await.unwrap());
        assert_eq!(store.list_rules("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rules_added_back_to_back_keep_creation_order() {
        let (_tmp, store) = setup().await;
        for round in 0..50 {
            let tenant = format!("t{}", round);
            let first = KnowledgeRule::new(&tenant, "price", "first added", false);
            let mut second = KnowledgeRule::new(&tenant, "price", "second added", false);
            second.created_at = first.created_at;
            store.insert_rule(&first).await.unwrap();
            store.insert_rule(&second).await.unwrap();

            let rules = store.list_rules(&tenant).await.unwrap();
            assert!(rules[0].seq < rules[1].seq);
            let matched = knowledge_core::rules::match_rule(&rules, "what is the price").unwrap();
            assert_eq!(matched.response, "first added");
        }
    }
}
