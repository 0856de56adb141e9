//! Query pipeline and the knowledge base facade
//!
//! `QueryPipeline` is the pure part: embed the query, rank the store, join
//! the hits. `KnowledgeBase` ties it to the SQLite store for the CLI and the
//! MCP server.

use std::path::Path;

use super::embedding::EmbeddingGenerator;
use super::similarity::{search, SearchResult};
use super::storage::{KnowledgeDb, StoreStats};
use crate::config::Config;
use crate::core::store::{EmbeddingReport, KnowledgeStore, SnapshotInfo};
use crate::error::{KbError, Result};

/// Line placed between content blocks in a context string.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Recorded for imported snapshots that do not name their model.
const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Clone)]
pub struct QueryPipeline {
    generator: EmbeddingGenerator,
}

impl QueryPipeline {
    pub fn new(generator: EmbeddingGenerator) -> Self {
        Self { generator }
    }

    /// Ranked hits for `query`.
    ///
    /// Query embedding failures are returned as errors, never replaced by a
    /// fallback vector. So is a store whose vectors differ in length from the
    /// query's.
    pub fn search(&self, query: &str, store: &KnowledgeStore, top_k: usize) -> Result<Vec<SearchResult>> {
        let pending = store.pending_count();
        if pending > 0 {
            return Err(KbError::StoreNotReady { pending });
        }

        let query_embedding = self.generator.embed(query)?;
        store.check_dimension(query_embedding.len())?;
        let results = search(&query_embedding, store, top_k);
        tracing::debug!(top_k, hits = results.len(), "query ranked");
        Ok(results)
    }

    /// Content of the best `top_k` items joined by [`CONTEXT_SEPARATOR`].
    ///
    /// An empty string means the store had nothing to return.
    pub fn answer_context(&self, query: &str, store: &KnowledgeStore, top_k: usize) -> Result<String> {
        let results = self.search(query, store, top_k)?;
        Ok(join_context(&results))
    }
}

pub fn join_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Persisted knowledge base: SQLite store plus the configured generator.
pub struct KnowledgeBase {
    db: KnowledgeDb,
    pipeline: QueryPipeline,
    progress_every: usize,
}

impl KnowledgeBase {
    pub fn open(config: &Config) -> Result<Self> {
        let db = KnowledgeDb::open(&config.store_path)?;
        Ok(Self::with_parts(db, config.generator()?, config.progress_every))
    }

    /// Like [`open`](Self::open), but never creates a missing store file.
    pub fn open_existing(config: &Config) -> Result<Self> {
        require_store(config)?;
        Self::open(config)
    }

    pub fn with_parts(db: KnowledgeDb, generator: EmbeddingGenerator, progress_every: usize) -> Self {
        Self {
            db,
            pipeline: QueryPipeline::new(generator),
            progress_every,
        }
    }

    fn generator(&self) -> &EmbeddingGenerator {
        &self.pipeline.generator
    }

    /// Embed every pending item of `store` and persist it, replacing the
    /// stored items.
    pub fn build(&mut self, mut store: KnowledgeStore, parallel: bool) -> Result<EmbeddingReport> {
        store.check_dimension(self.generator().dimension())?;
        tracing::info!(
            items = store.len(),
            provider = self.generator().provider_name(),
            model = self.generator().model_id(),
            "building knowledge base"
        );

        let report = if parallel {
            store.embed_all_parallel(self.generator(), self.progress_every)
        } else {
            store.embed_all(self.generator(), self.progress_every)
        };

        self.db.save_store(&store)?;
        let model = self.generator().model_id().to_string();
        let dimension = self.generator().dimension();
        self.db.set_embedding_info(&model, dimension)?;
        Ok(report)
    }

    /// Replace the stored items with an already-embedded snapshot and record
    /// its provenance.
    ///
    /// A snapshot without a model name keeps the dimension and is recorded as
    /// `unknown`, so loading it with any configured model warns.
    pub fn import(&mut self, store: &KnowledgeStore, info: &SnapshotInfo) -> Result<()> {
        let dimension = info.embedding_dim.or_else(|| store.embedding_dimension());
        if let Some(dimension) = dimension {
            store.check_dimension(dimension)?;
        }
        self.db.save_store(store)?;
        if let Some(dimension) = dimension {
            let model = info.embedding_model.as_deref().unwrap_or(UNKNOWN_MODEL);
            self.db.set_embedding_info(model, dimension)?;
        }
        Ok(())
    }

    /// Snapshot bytes of the persisted store, tagged with its model.
    pub fn export(&self) -> Result<(KnowledgeStore, Vec<u8>)> {
        let store = self.db.load_store()?;
        let model = self.db.embedding_info()?.map(|(model, _)| model);
        let bytes = store.serialize_with_model(model.as_deref())?;
        Ok((store, bytes))
    }

    pub fn load(&self) -> Result<KnowledgeStore> {
        let store = self.db.load_store()?;
        self.check_embedding_info();
        Ok(store)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let store = self.load()?;
        self.pipeline.search(query, &store, top_k)
    }

    pub fn answer_context(&self, query: &str, top_k: usize) -> Result<String> {
        let store = self.load()?;
        self.pipeline.answer_context(query, &store, top_k)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.db.stats()
    }

    /// Vectors from another model are still searched, but scores are
    /// meaningless; say so.
    fn check_embedding_info(&self) {
        match self.db.embedding_info() {
            Ok(Some((model, dimension)))
                if model != self.generator().model_id() || dimension != self.generator().dimension() =>
            {
                tracing::warn!(
                    stored_model = %model,
                    stored_dim = dimension,
                    model = self.generator().model_id(),
                    dim = self.generator().dimension(),
                    "store was built with a different embedding model"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not read embedding info"),
        }
    }
}

/// The configured store file exists. Opening a missing path would create an
/// empty database there.
pub fn require_store(config: &Config) -> Result<()> {
    if !Path::new(&config.store_path).exists() {
        return Err(KbError::Config(format!(
            "knowledge base not found at {}",
            config.store_path.display()
        )));
    }
    Ok(())
}

/// Single-call entry point: open the configured store and answer `query`.
pub fn answer_context_at(config: &Config, query: &str, top_k: usize) -> Result<String> {
    KnowledgeBase::open_existing(config)?.answer_context(query, top_k)
}
