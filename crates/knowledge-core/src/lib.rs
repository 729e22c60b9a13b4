//! # Knowledge Core
//!
//! Shared logic for the chatbot knowledge pipeline: data models, word-window
//! chunking, rule matching, context assembly, and the storage abstraction.
//!
//! This crate contains no tokio, sqlx, network, or filesystem dependencies.
//! Everything that talks to the outside world (SQLite, embedding and chat
//! providers, document parsing) lives in the `chatbot-knowledge` app crate.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rules;
pub mod store;

pub use error::KnowledgeError;
