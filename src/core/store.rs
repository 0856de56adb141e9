//! Knowledge store: ordered, append-only collection of items
//!
//! Built during ingestion (`append`, then `embed_all`), persisted, then
//! reloaded read-only for querying. Mutation needs `&mut self`, so a store
//! cannot be searched while an embedding pass is running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::item::{is_blank, KnowledgeItem, Metadata};
use crate::error::{KbError, Result};
use crate::search::embedding::{Embedded, EmbeddingGenerator};

/// Version written into serialized snapshots.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeStore {
    items: Vec<KnowledgeItem>,
}

/// Outcome of an embedding pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbeddingReport {
    pub embedded: usize,
    /// Store indices that received the zero fallback.
    pub failed: Vec<usize>,
    /// Items that already had an embedding.
    pub skipped: usize,
    pub duration_ms: u128,
}

impl EmbeddingReport {
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("{} embedded, {} already embedded", self.embedded, self.skipped)
        } else {
            let indices: Vec<String> = self.failed.iter().map(|i| i.to_string()).collect();
            format!(
                "{} embedded, {} failed (items {}), {} already embedded",
                self.embedded,
                self.failed.len(),
                indices.join(", "),
                self.skipped
            )
        }
    }
}

/// Provenance carried alongside the items in a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotInfo {
    /// Model that produced the vectors, when known.
    pub embedding_model: Option<String>,
    /// Length shared by every stored vector; `None` when nothing is embedded.
    pub embedding_dim: Option<usize>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    schema_version: u32,
    embedding_model: Option<&'a str>,
    embedding_dim: Option<usize>,
    items: &'a [KnowledgeItem],
}

#[derive(Deserialize)]
struct Snapshot {
    schema_version: u32,
    #[serde(default)]
    embedding_model: Option<String>,
    #[serde(default)]
    embedding_dim: Option<usize>,
    items: Vec<KnowledgeItem>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    /// Add an item without embedding. Returns its index.
    pub fn append(&mut self, content: impl Into<String>, metadata: Metadata) -> Result<usize> {
        let content = content.into();
        if is_blank(&content) {
            return Err(KbError::InvalidInput(format!(
                "item {} has empty content",
                self.items.len()
            )));
        }
        self.items.push(KnowledgeItem::new(content, metadata));
        Ok(self.items.len() - 1)
    }

    /// Add a prebuilt item. Any embedding it carries is dropped.
    pub fn append_item(&mut self, mut item: KnowledgeItem) -> Result<usize> {
        if is_blank(item.content()) {
            return Err(KbError::InvalidInput(format!(
                "item {} has empty content",
                self.items.len()
            )));
        }
        item.clear_embedding();
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    /// Used when reloading persisted items, embeddings included.
    pub(crate) fn push_embedded(&mut self, item: KnowledgeItem) {
        self.items.push(item);
    }

    /// Items still waiting for an embedding.
    pub fn pending_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_embedded()).count()
    }

    /// Every item has a vector, so search sees the whole store.
    pub fn is_ready(&self) -> bool {
        self.pending_count() == 0
    }

    /// Length of the first stored vector, if any item is embedded.
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.items.iter().find_map(|i| i.embedding()).map(<[f32]>::len)
    }

    /// Every stored vector has exactly `expected` components.
    pub fn check_dimension(&self, expected: usize) -> Result<()> {
        for (position, item) in self.items.iter().enumerate() {
            if let Some(embedding) = item.embedding() {
                if embedding.len() != expected {
                    return Err(KbError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                        position,
                    });
                }
            }
        }
        Ok(())
    }

    /// Indices of items carrying the fallback vector.
    pub fn degraded_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_degraded())
            .map(|(i, _)| i)
            .collect()
    }

    /// Embed every pending item, one provider call at a time, in store order.
    ///
    /// Provider failures never abort the pass: the item gets the zero vector
    /// and its index is listed in the report.
    pub fn embed_all(
        &mut self,
        generator: &EmbeddingGenerator,
        progress_every: usize,
    ) -> EmbeddingReport {
        let start = Instant::now();
        let total = self.items.len();
        let mut report = EmbeddingReport::default();

        for (index, item) in self.items.iter_mut().enumerate() {
            if item.is_embedded() {
                report.skipped += 1;
                continue;
            }

            let Embedded { vector, degraded } = generator.embed_or_fallback(index, item.content());
            item.assign_embedding(vector, degraded);
            if degraded {
                report.failed.push(index);
            } else {
                report.embedded += 1;
            }

            log_progress(index + 1, total, progress_every);
        }

        report.duration_ms = start.elapsed().as_millis();
        tracing::info!(
            embedded = report.embedded,
            failed = report.failed.len(),
            skipped = report.skipped,
            duration_ms = report.duration_ms as u64,
            "embedding pass finished"
        );
        report
    }

    /// Same contract as [`embed_all`](Self::embed_all) with provider calls
    /// spread over the rayon pool.
    ///
    /// All vectors are computed before any is assigned.
    pub fn embed_all_parallel(
        &mut self,
        generator: &EmbeddingGenerator,
        progress_every: usize,
    ) -> EmbeddingReport {
        let start = Instant::now();
        let total = self.items.len();
        let done = AtomicUsize::new(0);

        let pending: Vec<(usize, &str)> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_embedded())
            .map(|(index, item)| (index, item.content()))
            .collect();
        let skipped = total - pending.len();

        let computed: Vec<(usize, Embedded)> = pending
            .into_par_iter()
            .map(|(index, content)| {
                let embedded = generator.embed_or_fallback(index, content);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                log_progress(skipped + finished, total, progress_every);
                (index, embedded)
            })
            .collect();

        let mut report = EmbeddingReport {
            skipped,
            ..Default::default()
        };
        for (index, Embedded { vector, degraded }) in computed {
            self.items[index].assign_embedding(vector, degraded);
            if degraded {
                report.failed.push(index);
            } else {
                report.embedded += 1;
            }
        }

        report.duration_ms = start.elapsed().as_millis();
        tracing::info!(
            embedded = report.embedded,
            failed = report.failed.len(),
            skipped = report.skipped,
            duration_ms = report.duration_ms as u64,
            "parallel embedding pass finished"
        );
        report
    }

    /// Give every pending item the zero vector, marked degraded.
    ///
    /// Makes an interrupted pass searchable. Returns how many items were
    /// filled.
    pub fn fill_pending_with_fallback(&mut self, dimension: usize) -> usize {
        let mut filled = 0;
        for item in self.items.iter_mut().filter(|i| !i.is_embedded()) {
            item.assign_embedding(vec![0.0; dimension], true);
            filled += 1;
        }
        if filled > 0 {
            tracing::warn!(filled, "pending items given the zero vector");
        }
        filled
    }

    /// Versioned snapshot of the full item list.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.serialize_with_model(None)
    }

    /// Snapshot that also records which model produced the vectors.
    pub fn serialize_with_model(&self, embedding_model: Option<&str>) -> Result<Vec<u8>> {
        let non_finite = self.items.iter().position(|item| {
            item.embedding()
                .is_some_and(|v| v.iter().any(|x| !x.is_finite()))
        });
        if let Some(index) = non_finite {
            return Err(KbError::Serialization(format!(
                "item {index} has a non-finite embedding component"
            )));
        }

        let embedding_dim = self.embedding_dimension();
        if let Some(dim) = embedding_dim {
            self.check_dimension(dim)?;
        }

        let snapshot = SnapshotRef {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            embedding_model,
            embedding_dim,
            items: &self.items,
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Self::deserialize_with_info(bytes).map(|(store, _)| store)
    }

    /// Restore a snapshot along with its provenance.
    ///
    /// Vectors of differing lengths, or a length other than the recorded
    /// `embedding_dim`, are rejected.
    pub fn deserialize_with_info(bytes: &[u8]) -> Result<(Self, SnapshotInfo)> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(KbError::Serialization(format!(
                "unsupported snapshot schema version {} (expected {})",
                snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION
            )));
        }
        if let Some(index) = snapshot.items.iter().position(|i| is_blank(i.content())) {
            return Err(KbError::Serialization(format!(
                "snapshot item {index} has empty content"
            )));
        }

        let store = Self {
            items: snapshot.items,
        };
        let embedding_dim = snapshot.embedding_dim.or_else(|| store.embedding_dimension());
        if let Some(dim) = embedding_dim {
            store
                .check_dimension(dim)
                .map_err(|e| KbError::Serialization(format!("snapshot: {e}")))?;
        }
        let info = SnapshotInfo {
            embedding_model: snapshot.embedding_model,
            embedding_dim,
        };
        Ok((store, info))
    }
}

/// An info line is due after every `every` items; 0 disables it.
fn progress_due(done: usize, every: usize) -> bool {
    every > 0 && done % every == 0
}

fn log_progress(done: usize, total: usize, every: usize) {
    if progress_due(done, every) {
        tracing::info!("embedded {}/{}", done, total);
    }
}
