//! Knowledge items, the in-memory store and the ingestion hand-off.

pub mod item;
pub mod records;
pub mod store;
