//! Fixtures shared by unit tests: a scripted model provider and a DOCX builder.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use knowledge_core::KnowledgeError;

use crate::provider::{ChatParams, ModelProvider};

/// Provider double with canned embeddings and replies.
///
/// Every text embeds to `vector` unless `embed_error` is set. Chat returns
/// `reply` or a generation error when it is `None`.
pub struct StubProvider {
    pub vector: Vec<f32>,
    pub embed_error: Option<String>,
    pub reply: Option<String>,
    pub embed_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub last_system: Mutex<Option<String>>,
    pub last_user: Mutex<Option<String>>,
}

impl StubProvider {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            embed_error: None,
            reply: Some("stub answer".to_string()),
            embed_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            last_system: Mutex::new(None),
            last_user: Mutex::new(None),
        }
    }

    pub fn failing_embeddings(message: &str) -> Self {
        Self {
            embed_error: Some(message.to_string()),
            ..Self::new(vec![1.0, 0.0])
        }
    }

    pub fn with_reply(mut self, reply: Option<&str>) -> Self {
        self.reply = reply.map(str::to_string);
        self
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn last_system(&self) -> Option<String> {
        self.last_system.lock().unwrap().clone()
    }

    pub fn last_user(&self) -> Option<String> {
        self.last_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }
    fn embedding_model(&self) -> &str {
        "stub-embed"
    }
    fn dims(&self) -> usize {
        self.vector.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.embed_error {
            return Err(KnowledgeError::EmbeddingProvider(message.clone()));
        }
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    async fn chat_complete(
        &self,
        system: &str,
        user: &str,
        _params: ChatParams,
    ) -> Result<String, KnowledgeError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_system.lock().unwrap() = Some(system.to_string());
        *self.last_user.lock().unwrap() = Some(user.to_string());
        self.reply
            .clone()
            .ok_or_else(|| KnowledgeError::Generation("stub chat failure".to_string()))
    }
}

/// A minimal `.docx` archive with one `w:p` per paragraph.
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}
