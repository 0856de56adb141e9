//! Persisted knowledge store on SQLite
//!
//! Items live in insertion order keyed by `position`; embeddings are
//! little-endian f32 BLOBs so vectors come back bit-for-bit.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::core::item::{KnowledgeItem, Metadata};
use crate::core::store::KnowledgeStore;
use crate::error::{KbError, Result};

/// Bumped whenever the table layout changes.
pub const DB_SCHEMA_VERSION: u32 = 1;

const META_SCHEMA_VERSION: &str = "schema_version";
const META_MODEL: &str = "embedding_model";
const META_DIMENSION: &str = "embedding_dim";
const META_LAST_BUILT: &str = "last_built";

pub struct KnowledgeDb {
    conn: Connection,
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub item_count: usize,
    pub embedded_count: usize,
    pub degraded_count: usize,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<usize>,
    pub last_built: Option<i64>,
}

impl KnowledgeDb {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                position INTEGER PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,  -- JSON object
                embedding BLOB,
                degraded INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;

        match self.get_meta(META_SCHEMA_VERSION)? {
            None => self.set_meta(META_SCHEMA_VERSION, &DB_SCHEMA_VERSION.to_string())?,
            Some(v) if v == DB_SCHEMA_VERSION.to_string() => {}
            Some(v) => {
                return Err(KbError::Serialization(format!(
                    "store schema version {v} is not supported (expected {DB_SCHEMA_VERSION})"
                )))
            }
        }

        Ok(())
    }

    /// Replace the persisted items with `store`, in one transaction.
    pub fn save_store(&mut self, store: &KnowledgeStore) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM items", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items (position, content, metadata, embedding, degraded) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, item) in store.items().iter().enumerate() {
                let metadata_json = serde_json::to_string(item.metadata())?;
                let blob = item.embedding().map(embedding_to_blob);
                stmt.execute(params![
                    position as i64,
                    item.content(),
                    metadata_json,
                    blob,
                    item.is_degraded(),
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![META_LAST_BUILT, chrono::Utc::now().timestamp().to_string()],
        )?;
        tx.commit()?;

        tracing::debug!(items = store.len(), "store saved");
        Ok(())
    }

    /// Load all items in insertion order.
    pub fn load_store(&self) -> Result<KnowledgeStore> {
        let mut stmt = self
            .conn
            .prepare("SELECT position, content, metadata, embedding, degraded FROM items ORDER BY position")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?;

        let mut store = KnowledgeStore::new();
        for row in rows {
            let (position, content, metadata_json, blob, degraded) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                KbError::Serialization(format!("item {position}: bad metadata: {e}"))
            })?;
            let embedding = blob
                .as_deref()
                .map(blob_to_embedding)
                .transpose()
                .map_err(|e| KbError::Serialization(format!("item {position}: {e}")))?;
            if content.trim().is_empty() {
                return Err(KbError::Serialization(format!(
                    "item {position} has empty content"
                )));
            }
            store.push_embedded(KnowledgeItem::with_embedding(
                content, metadata, embedding, degraded,
            ));
        }

        Ok(store)
    }

    /// Record which model produced the stored vectors.
    pub fn set_embedding_info(&self, model: &str, dimension: usize) -> Result<()> {
        self.set_meta(META_MODEL, model)?;
        self.set_meta(META_DIMENSION, &dimension.to_string())
    }

    pub fn embedding_info(&self) -> Result<Option<(String, usize)>> {
        let model = self.get_meta(META_MODEL)?;
        let dimension = self
            .get_meta(META_DIMENSION)?
            .and_then(|d| d.parse::<usize>().ok());
        Ok(model.zip(dimension))
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let (item_count, embedded_count, degraded_count): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(embedding), COALESCE(SUM(degraded), 0) FROM items",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let last_built = self
            .get_meta(META_LAST_BUILT)?
            .and_then(|v| v.parse::<i64>().ok());

        Ok(StoreStats {
            item_count: item_count as usize,
            embedded_count: embedded_count as usize,
            degraded_count: degraded_count as usize,
            embedding_model: self.get_meta(META_MODEL)?,
            embedding_dim: self
                .get_meta(META_DIMENSION)?
                .and_then(|d| d.parse::<usize>().ok()),
            last_built,
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(value)
    }
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> std::result::Result<Vec<f32>, String> {
    if blob.len() % 4 != 0 {
        return Err(format!("embedding blob of {} bytes is not f32-aligned", blob.len()));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
