//! Model provider abstraction: embeddings and chat completion.
//!
//! One [`ModelProvider`] is built at startup by [`create_provider`] from the
//! `[provider]` section and shared by ingestion and answering.
//!
//! - **[`OpenAiCompatProvider`]** speaks the OpenAI `/v1/embeddings` and
//!   `/v1/chat/completions` wire format. It backs both `openai` and
//!   `ollama` (through Ollama's OpenAI-compatible endpoint).
//! - **[`DisabledProvider`]** fails every call; useful for operating on
//!   rules and documents without network access.
//!
//! # Retry Strategy
//!
//! Each HTTP call retries with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use knowledge_core::embedding::check_dims;
use knowledge_core::KnowledgeError;

use crate::config::{GenerationConfig, ProviderConfig, ProviderKind};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
/// Shipped in sample `.env` files; treated as unset.
const PLACEHOLDER_API_KEY: &str = "your-openai-api-key-here";

/// Sampling parameters for one chat completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl From<&GenerationConfig> for ChatParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

/// Capability interface over an embedding + chat model backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short backend label (`"openai"`, `"ollama"`, `"disabled"`).
    fn name(&self) -> &str;

    /// Embedding model identifier.
    fn embedding_model(&self) -> &str;

    /// Expected embedding dimensionality.
    fn dims(&self) -> usize;

    /// Embed `texts`, returning one vector per input in input order.
    ///
    /// Implementations split large inputs into provider-sized requests.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;

    /// Embed a single text (a user query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::EmbeddingProvider("empty embedding response".into()))
    }

    /// One chat completion with a system instruction and a single user turn.
    async fn chat_complete(
        &self,
        system: &str,
        user: &str,
        params: ChatParams,
    ) -> Result<String, KnowledgeError>;
}

/// Build the provider selected by `config.kind`.
///
/// Fails with [`KnowledgeError::Configuration`] when the OpenAI key is
/// missing or still the placeholder value.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>, KnowledgeError> {
    match config.kind {
        ProviderKind::Openai => {
            let key = resolve_api_key(std::env::var("OPENAI_API_KEY").ok())?;
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            Ok(Arc::new(OpenAiCompatProvider::new(
                "openai",
                base_url,
                Some(key),
                config,
            )?))
        }
        ProviderKind::Ollama => {
            let base_url = std::env::var("OLLAMA_BASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .or_else(|| config.base_url.clone())
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
            Ok(Arc::new(OpenAiCompatProvider::new(
                "ollama", base_url, None, config,
            )?))
        }
        ProviderKind::Disabled => Ok(Arc::new(DisabledProvider)),
    }
}

fn resolve_api_key(value: Option<String>) -> Result<String, KnowledgeError> {
    match value.map(|v| v.trim().to_string()) {
        Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => Ok(key),
        _ => Err(KnowledgeError::Configuration(
            "OPENAI_API_KEY is not set; export it or switch provider.kind".to_string(),
        )),
    }
}

// ============ Disabled Provider ============

/// A provider that refuses every call.
pub struct DisabledProvider;

#[async_trait]
impl ModelProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }
    fn embedding_model(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        Err(KnowledgeError::EmbeddingProvider(
            "model provider is disabled".to_string(),
        ))
    }

    async fn chat_complete(
        &self,
        _system: &str,
        _user: &str,
        _params: ChatParams,
    ) -> Result<String, KnowledgeError> {
        Err(KnowledgeError::Generation(
            "model provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI-compatible Provider ============

/// Provider for any endpoint implementing the OpenAI embeddings and chat
/// completions API.
pub struct OpenAiCompatProvider {
    label: &'static str,
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        label: &'static str,
        base_url: String,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Result<Self, KnowledgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KnowledgeError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            label,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model().to_string(),
            chat_model: config.chat_model().to_string(),
            dims: config.dims(),
            batch_size: config.embed_batch_size().max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    /// POST `body` to `{base_url}/{path}` with retry/backoff.
    ///
    /// Errors are returned as plain messages; callers wrap them in the
    /// appropriate [`KnowledgeError`] kind.
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(provider = self.label, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .map_err(|e| format!("invalid {} response: {}", self.label, e));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let message = format!("{} API error {}: {}", self.label, status, body_text);

                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(provider = self.label, %status, "transient provider error");
                        last_err = Some(message);
                        continue;
                    }

                    return Err(message);
                }
                Err(e) => {
                    last_err = Some(format!("{} connection error ({}): {}", self.label, url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", self.label)))
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.label
    }
    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = json!({
                "model": self.embedding_model,
                "input": batch,
            });
            let json = self
                .post_json("embeddings", &body)
                .await
                .map_err(KnowledgeError::EmbeddingProvider)?;
            let batch_vectors = parse_embeddings(&json)?;
            if batch_vectors.len() != batch.len() {
                return Err(KnowledgeError::EmbeddingProvider(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    batch_vectors.len()
                )));
            }
            vectors.extend(batch_vectors);
        }

        check_dims(&vectors, self.dims)?;
        Ok(vectors)
    }

    async fn chat_complete(
        &self,
        system: &str,
        user: &str,
        params: ChatParams,
    ) -> Result<String, KnowledgeError> {
        let body = json!({
            "model": self.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
        });
        let json = self
            .post_json("chat/completions", &body)
            .await
            .map_err(KnowledgeError::Generation)?;
        parse_chat_completion(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` when present.
fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, KnowledgeError> {
    let invalid = |what: &str| KnowledgeError::EmbeddingProvider(format!("invalid response: {}", what));

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid("missing embedding"))?;
        let vec = embedding
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| invalid("non-numeric embedding value"))?;
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_chat_completion(json: &serde_json::Value) -> Result<String, KnowledgeError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| KnowledgeError::Generation("invalid response: missing message content".into()))
}
