//! Embedding, similarity search and the query pipeline
//!
//! Providers: OpenAI-compatible HTTP and local harmonic token projection.
//! Persistence: SQLite.

pub mod embedding;
pub mod engine;
pub mod htp;
pub mod openai;
pub mod similarity;
pub mod storage;

pub use embedding::{EmbeddingGenerator, EmbeddingProvider};
pub use engine::{answer_context_at, require_store, KnowledgeBase, QueryPipeline};
pub use similarity::{cosine_similarity, search, SearchResult};
pub use storage::KnowledgeDb;
