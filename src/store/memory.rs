//! In-memory [`KnowledgeStore`] implementation for testing.
//!
//! Documents live in a `Vec` behind `std::sync::RwLock`, in insertion order.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::KnowledgeStore;
use crate::models::{KnowledgeDocument, KnowledgeType};

#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<Vec<KnowledgeDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert(&self, doc: &KnowledgeDocument) -> Result<()> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow::anyhow!("knowledge store lock poisoned"))?;
        if docs.iter().any(|d| d.id == doc.id) {
            anyhow::bail!("duplicate knowledge id: {}", doc.id);
        }
        docs.push(doc.clone());
        Ok(())
    }

    async fn recent(
        &self,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeDocument>> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("knowledge store lock poisoned"))?;
        // Walk newest insert first; the stable sort then keeps that order
        // among documents with equal timestamps.
        let mut selected: Vec<KnowledgeDocument> = docs
            .iter()
            .rev()
            .filter(|d| types.map_or(true, |ts| ts.contains(&d.kind)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected.truncate(limit);
        Ok(selected)
    }

    async fn count(&self) -> Result<i64> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("knowledge store lock poisoned"))?;
        Ok(docs.len() as i64)
    }
}
