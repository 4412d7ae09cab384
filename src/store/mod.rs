//! Storage abstraction for knowledge documents.
//!
//! The [`KnowledgeStore`] trait is the only thing the knowledge base needs
//! from a document store: append, fetch the newest documents of some types,
//! and count. Two backends ship with the crate:
//!
//! - [`sqlite::SqliteStore`]: the production store, also used to persist
//!   the player snapshot.
//! - [`memory::InMemoryStore`]: for tests and database-less runs.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{KnowledgeDocument, KnowledgeType};

/// Abstract append-only document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](KnowledgeStore::insert) | Append a fully-formed document |
/// | [`recent`](KnowledgeStore::recent) | Newest documents, optionally restricted to some types |
/// | [`count`](KnowledgeStore::count) | Number of stored documents |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Append a document. Documents are never updated afterwards.
    async fn insert(&self, doc: &KnowledgeDocument) -> Result<()>;

    /// Up to `limit` documents ordered by creation time, newest first.
    ///
    /// When `types` is `Some`, only documents of those types are returned.
    /// Documents created at the same instant come back newest-insert first.
    async fn recent(
        &self,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeDocument>>;

    async fn count(&self) -> Result<i64>;
}
