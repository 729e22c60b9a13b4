//! # Chatbot Knowledge CLI (`kb`)
//!
//! Operator interface to the knowledge pipeline.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb init` | Create the SQLite database and schema |
//! | `kb upload <tenant> <file>` | Ingest a PDF or Word document |
//! | `kb ask <tenant> "<message>"` | Answer a message as the tenant's bot |
//! | `kb rules add\|list\|delete` | Manage trigger → response rules (`list --json`) |
//! | `kb documents list\|delete` | Inspect or remove uploads (`list --json`) |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatbot_knowledge::config::{self, Config};
use chatbot_knowledge::ingest::Ingestor;
use chatbot_knowledge::provider::{create_provider, ModelProvider};
use chatbot_knowledge::responder::Responder;
use chatbot_knowledge::sqlite_store::SqliteStore;
use chatbot_knowledge::{db, logging, migrate, rules_cmd, status};
use knowledge_core::models::DocumentStatus;
use knowledge_core::store::Store;

/// Chatbot knowledge base: ingest documents and answer questions from them.
#[derive(Parser)]
#[command(name = "kb", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest a document for a tenant and wait for it to finish.
    Upload {
        tenant: String,
        /// `.pdf`, `.docx` or `.doc` file.
        file: PathBuf,
    },

    /// Answer a message using the tenant's rules and documents.
    Ask {
        tenant: String,
        message: String,
        /// Name the bot introduces itself with.
        #[arg(long, default_value = "Assistant")]
        bot_name: String,
    },

    /// Manage trigger → response rules.
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Inspect or delete uploaded documents.
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Add a rule. Contains-match unless `--exact`.
    Add {
        tenant: String,
        trigger: String,
        response: String,
        /// Match only when the whole message equals the trigger.
        #[arg(long)]
        exact: bool,
    },
    /// List a tenant's rules in evaluation order.
    List {
        tenant: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Delete a rule by id.
    Delete { tenant: String, id: String },
}

#[derive(Subcommand)]
enum DocumentsAction {
    /// List a tenant's documents with their ingestion status.
    List {
        tenant: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Delete a document and its chunks.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { tenant, file } => {
            let store = open_store(&cfg).await?;
            let provider = build_provider(&cfg)?;
            run_upload(&cfg, store, provider, &tenant, &file).await?;
        }
        Commands::Ask {
            tenant,
            message,
            bot_name,
        } => {
            let store = open_store(&cfg).await?;
            let provider = build_provider(&cfg)?;
            let responder = Responder::new(store, provider, &cfg);
            let reply = responder
                .answer(&tenant, &message, &bot_name)
                .await
                .into_option()
                .unwrap_or_else(|| cfg.generation.fallback_message.clone());
            println!("{}", reply);
        }
        Commands::Rules { action } => {
            let store = open_store(&cfg).await?;
            match action {
                RulesAction::Add {
                    tenant,
                    trigger,
                    response,
                    exact,
                } => {
                    let rule =
                        rules_cmd::add_rule(store.as_ref(), &tenant, &trigger, &response, exact)
                            .await?;
                    println!("Added rule {}", rule.id);
                }
                RulesAction::List { tenant, json } => {
                    let rules = rules_cmd::list_rules(store.as_ref(), &tenant).await?;
                    if json {
                        println!("{}", rules_cmd::rules_json(&rules)?);
                    } else {
                        rules_cmd::print_rules(&rules);
                    }
                }
                RulesAction::Delete { tenant, id } => {
                    rules_cmd::delete_rule(store.as_ref(), &tenant, &id).await?;
                    println!("Deleted rule {}", id);
                }
            }
        }
        Commands::Documents { action } => {
            let store = open_store(&cfg).await?;
            match action {
                DocumentsAction::List { tenant, json } => {
                    let (docs, summary) = status::summarize(store.as_ref(), &tenant).await?;
                    if json {
                        println!("{}", status::documents_json(&tenant, &docs, &summary)?);
                    } else {
                        status::print_documents(&tenant, &docs, &summary);
                    }
                }
                DocumentsAction::Delete { id } => {
                    status::delete_document(store.as_ref(), &id).await?;
                    println!("Deleted document {}", id);
                }
            }
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> Result<Arc<dyn Store>> {
    let pool = db::connect(cfg).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn build_provider(cfg: &Config) -> Result<Arc<dyn ModelProvider>> {
    create_provider(&cfg.provider).map_err(|e| {
        tracing::error!(provider = ?cfg.provider.kind, error = %e, "model provider is not usable");
        anyhow::Error::from(e)
    })
}

async fn run_upload(
    cfg: &Config,
    store: Arc<dyn Store>,
    provider: Arc<dyn ModelProvider>,
    tenant: &str,
    file: &Path,
) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", file.display()))?
        .to_string();
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let ingestor = Ingestor::new(store.clone(), provider, cfg.chunking.clone());
    let upload = ingestor.accept_upload(tenant, &filename, bytes).await?;
    println!("Accepted {} as document {}", filename, upload.document.id);

    let final_status = upload.task.await.context("ingestion task panicked")?;
    let doc = store
        .get_document(&upload.document.id)
        .await?
        .with_context(|| format!("document {} disappeared", upload.document.id))?;

    match final_status {
        DocumentStatus::Ready => {
            println!("Ready: {} chunks", doc.chunk_count);
            Ok(())
        }
        _ => bail!(
            "ingestion failed: {}",
            doc.error_message.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}
