//! Knowledge base: add, search and render knowledge documents.
//!
//! [`KnowledgeBase`] wraps a [`KnowledgeStore`] and a [`Clock`]. The store
//! only knows how to append and list; this module owns id assignment,
//! context-type narrowing, scoring and prompt rendering.
//!
//! # Search
//!
//! ```text
//! context type ──▶ allowed types ──▶ store.recent(types, 2 × max)
//!                                         │
//!                    query terms ──▶ scoring::rank ──▶ top max
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{ContextType, KnowledgeDocument, KnowledgeType, NewKnowledge};
use crate::scoring::{self, ScoredDocument};
use crate::store::KnowledgeStore;

/// Returned by [`render_context`] when nothing relevant was found.
pub const NO_CONTEXT: &str = "No specific additional context found.";

/// Parameters for [`KnowledgeBase::search`].
#[derive(Debug, Clone)]
pub struct KnowledgeQuery {
    pub query: String,
    pub context_type: Option<ContextType>,
    pub player_mentions: Vec<String>,
    pub max_results: usize,
}

impl KnowledgeQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            context_type: None,
            player_mentions: Vec::new(),
            max_results,
        }
    }

    pub fn context(mut self, context_type: ContextType) -> Self {
        self.context_type = Some(context_type);
        self
    }

    pub fn mentions(mut self, names: Vec<String>) -> Self {
        self.player_mentions = names;
        self
    }
}

/// Document types a context type may draw on. `None` means unrestricted.
pub fn allowed_types(context_type: ContextType) -> Option<&'static [KnowledgeType]> {
    use KnowledgeType::*;
    match context_type {
        ContextType::Injury => Some(&[InjuryReport, PlayerNews]),
        ContextType::Matchup => Some(&[MatchupAnalysis, Weather]),
        ContextType::StartSit => Some(&[ExpertArticle, Rankings, MatchupAnalysis]),
        ContextType::Waiver => Some(&[PlayerNews, ExpertArticle, AdvancedStats]),
        ContextType::Trade => Some(&[ExpertArticle, AdvancedStats, Rankings]),
        ContextType::General => None,
    }
}

pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    clock: Arc<dyn Clock>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn KnowledgeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Store a new document and return its generated id.
    pub async fn add(&self, new: NewKnowledge) -> Result<String> {
        let doc = KnowledgeDocument {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            content: new.content,
            metadata: new.metadata,
            created_at: self.clock.now(),
        };
        self.store.insert(&doc).await?;
        debug!(id = %doc.id, kind = %doc.kind, "knowledge added");
        Ok(doc.id)
    }

    pub async fn search(&self, q: &KnowledgeQuery) -> Result<Vec<ScoredDocument>> {
        if q.max_results == 0 {
            return Ok(Vec::new());
        }
        let types = q.context_type.and_then(allowed_types);
        let candidates = self.store.recent(types, q.max_results.saturating_mul(2)).await?;
        let candidate_count = candidates.len();

        let terms = scoring::query_terms(&q.query);
        let mut ranked = scoring::rank(candidates, &terms, &q.player_mentions, self.clock.now());
        ranked.truncate(q.max_results);

        debug!(
            candidates = candidate_count,
            returned = ranked.len(),
            context = ?q.context_type,
            "knowledge search"
        );
        Ok(ranked)
    }

    pub async fn count(&self) -> Result<i64> {
        self.store.count().await
    }
}

/// Format search results as the knowledge block of a prompt.
pub fn render_context(results: &[ScoredDocument]) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }
    let mut out = String::from("\n\nADDITIONAL FANTASY FOOTBALL CONTEXT:\n");
    for (i, scored) in results.iter().enumerate() {
        let doc = &scored.document;
        out.push_str(&format!(
            "\n{}. {}: {}",
            i + 1,
            doc.kind.as_str().to_uppercase(),
            doc.content
        ));
        if let Some(source) = &doc.metadata.source {
            out.push_str(&format!(" (Source: {})", source));
        }
    }
    out
}
