//! TOML configuration.
//!
//! Every tunable of the pipeline (chunk window, retrieval depth, relevance
//! floor, provider models, generation parameters) lives here and is passed
//! into components at construction. Only `db.path` is required.
//!
//! ```toml
//! [db]
//! path = "./data/kb.sqlite"
//!
//! [chunking]
//! size = 500
//! overlap = 50
//!
//! [retrieval]
//! top_k = 5
//! min_similarity = 0.3
//!
//! [provider]
//! kind = "openai"          # openai | ollama | disabled
//!
//! [generation]
//! temperature = 0.3
//! max_tokens = 500
//! ```
//!
//! Credentials are never read from the file: the OpenAI key comes from
//! `OPENAI_API_KEY`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_core::chunk::{validate_window, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use knowledge_core::context::{DEFAULT_FALLBACK_MESSAGE, DEFAULT_MIN_SIMILARITY};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in words.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    /// Words shared by consecutive windows. Must be < `size`.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Results with similarity at or below this are dropped from the context.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}

/// Which model provider backs embeddings and chat.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Ollama,
    Disabled,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    /// Overrides the provider's default API base (must include `/v1`).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub chat_model: Option<String>,
    /// Expected vector length. Defaults per provider.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Max texts per embedding request. Defaults per provider.
    #[serde(default)]
    pub embed_batch_size: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            embedding_model: None,
            chat_model: None,
            dims: None,
            embed_batch_size: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Openai
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

impl ProviderConfig {
    pub fn embedding_model(&self) -> &str {
        match (&self.embedding_model, self.kind) {
            (Some(m), _) => m,
            (None, ProviderKind::Ollama) => "nomic-embed-text",
            (None, _) => "text-embedding-3-small",
        }
    }

    pub fn chat_model(&self) -> &str {
        match (&self.chat_model, self.kind) {
            (Some(m), _) => m,
            (None, ProviderKind::Ollama) => "llama3",
            (None, _) => "gpt-4o-mini",
        }
    }

    pub fn dims(&self) -> usize {
        match (self.dims, self.kind) {
            (Some(n), _) => n,
            (None, ProviderKind::Ollama) => 768,
            (None, _) => 1536,
        }
    }

    /// Provider-specific request ceiling unless overridden.
    pub fn embed_batch_size(&self) -> usize {
        match (self.embed_batch_size, self.kind) {
            (Some(n), _) => n,
            (None, ProviderKind::Ollama) => 10,
            (None, _) => 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Sentence the model must use verbatim when the context has no answer.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}
fn default_top_p() -> f32 {
    0.9
}
fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// A config with every default and the given database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_window(self.chunking.size, self.chunking.overlap)
            .context("chunking.overlap must be smaller than chunking.size, and size > 0")?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
        }

        if self.provider.kind != ProviderKind::Disabled {
            if self.provider.dims() == 0 {
                bail!("provider.dims must be > 0");
            }
            if self.provider.embed_batch_size() == 0 {
                bail!("provider.embed_batch_size must be > 0");
            }
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be > 0");
        }
        if self.generation.fallback_message.trim().is_empty() {
            bail!("generation.fallback_message must not be empty");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
