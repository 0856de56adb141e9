//! shelfsense library
//!
//! Embedding-backed knowledge base for a bookshop assistant: catalog rows and
//! past customer conversations go in as text, natural-language questions
//! come out as ranked context blocks.
//!
//! # Modules
//!
//! - `core`: knowledge items, the store and the JSON Lines hand-off
//! - `search`: embedding providers, similarity search, query pipeline, SQLite persistence
//! - `config`: explicit runtime configuration
//! - `error`: error types

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod search;

// Re-exports for convenience
pub use config::{Config, ProviderKind};
pub use crate::core::item::{KnowledgeItem, Metadata};
pub use crate::core::store::{EmbeddingReport, KnowledgeStore, SnapshotInfo};
pub use error::{KbError, ProviderError, Result};
pub use search::engine::{answer_context_at, KnowledgeBase, QueryPipeline, CONTEXT_SEPARATOR};
pub use search::similarity::{cosine_similarity, search, SearchResult};
