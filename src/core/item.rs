use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form key/value data attached to an item.
///
/// Shape depends on where the item came from (catalog row, conversation).
/// Nothing in search or embedding reads it.
pub type Metadata = BTreeMap<String, String>;

/// One retrievable unit of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    content: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    /// Set when `embedding` is the zero fallback.
    #[serde(default)]
    degraded: bool,
}

impl KnowledgeItem {
    /// New, not yet embedded item.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            embedding: None,
            degraded: false,
        }
    }

    pub(crate) fn with_embedding(
        content: String,
        metadata: Metadata,
        embedding: Option<Vec<f32>>,
        degraded: bool,
    ) -> Self {
        Self {
            content,
            metadata,
            embedding,
            degraded,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Assign the vector once. Returns false if the item already had one.
    pub(crate) fn assign_embedding(&mut self, embedding: Vec<f32>, degraded: bool) -> bool {
        if self.embedding.is_some() {
            return false;
        }
        self.embedding = Some(embedding);
        self.degraded = degraded;
        true
    }

    pub(crate) fn clear_embedding(&mut self) {
        self.embedding = None;
        self.degraded = false;
    }
}

/// True for content that must never enter the store.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_pending() {
        let item = KnowledgeItem::new("Libro: Rayuela", Metadata::new());
        assert!(!item.is_embedded());
        assert!(!item.is_degraded());
        assert_eq!(item.content(), "Libro: Rayuela");
    }

    #[test]
    fn test_embedding_assigned_once() {
        let mut item = KnowledgeItem::new("text", Metadata::new());
        assert!(item.assign_embedding(vec![0.5, 0.5], false));
        assert!(!item.assign_embedding(vec![0.0, 0.0], true));
        assert_eq!(item.embedding(), Some(&[0.5f32, 0.5][..]));
        assert!(!item.is_degraded());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t "));
        assert!(!is_blank(" x "));
    }
}
