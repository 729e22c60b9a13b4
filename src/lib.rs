//! # Chatbot Knowledge
//!
//! Document ingestion, tenant-scoped vector retrieval, and guardrailed
//! answering for a chatbot knowledge base.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │  Upload    │──▶│ Extract→Chunk→Embed   │──▶│  SQLite  │
//! │ (pdf/docx) │   │      (ingest)        │   │ + BLOBs  │
//! └────────────┘   └──────────────────────┘   └────┬─────┘
//!                                                  │
//!  question ──▶ rules ──▶ retrieve ──▶ prompt ──▶ chat model
//!                        (responder)
//! ```
//!
//! Pure logic (models, chunking, rule matching, prompt assembly, the
//! `Store` trait) lives in the `knowledge-core` crate. This crate adds
//! SQLite persistence, document parsing, the model provider, and the
//! `kb` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`extract`] | PDF / DOCX text extraction |
//! | [`provider`] | Embedding and chat providers |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`responder`] | Rule matching, retrieval, and generation |
//! | [`rules_cmd`] | Operator rule management |
//! | [`status`] | Document listing |
//! | [`logging`] | tracing subscriber setup |

pub mod config;
pub mod db;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod provider;
pub mod responder;
pub mod rules_cmd;
pub mod sqlite_store;
pub mod status;

#[cfg(test)]
mod test_support;
