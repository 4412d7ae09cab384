//! Keyword relevance scoring for knowledge documents.
//!
//! Scores are small additive integers, never normalized:
//!
//! | Signal | Points |
//! |--------|--------|
//! | query term found in content | +2 per term |
//! | query term found in any tag | +1 per term |
//! | player mention matches a document player name | +5 per mention |
//! | document younger than 7 days | +2 |
//! | document younger than 30 days | +1 |
//!
//! Matching is case-insensitive substring matching throughout. Player names
//! match in either direction, so "Kupp" matches "Cooper Kupp" and vice versa.
//! Documents scoring 0 are dropped by [`rank`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::KnowledgeDocument;

/// Words of at most this many characters are ignored as query terms.
const MIN_TERM_CHARS: usize = 3;

/// Lowercase words of `query` longer than three characters, with leading
/// and trailing punctuation trimmed.
pub fn query_terms(query: &str) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > MIN_TERM_CHARS)
        .map(str::to_string)
        .collect()
}

fn recency_bonus(created_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days_old = now.signed_duration_since(created_at).num_days();
    if days_old < 7 {
        2
    } else if days_old < 30 {
        1
    } else {
        0
    }
}

/// Relevance of `doc` for the given terms and player mentions at time `now`.
pub fn score(
    doc: &KnowledgeDocument,
    terms: &BTreeSet<String>,
    player_mentions: &[String],
    now: DateTime<Utc>,
) -> u32 {
    let mut total = 0;
    let content = doc.content.to_lowercase();
    let tags: Vec<String> = doc
        .metadata
        .tags
        .iter()
        .flatten()
        .map(|t| t.to_lowercase())
        .collect();

    for term in terms {
        if content.contains(term.as_str()) {
            total += 2;
        }
        if tags.iter().any(|t| t.contains(term.as_str())) {
            total += 1;
        }
    }

    if let Some(names) = &doc.metadata.player_names {
        let names: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        for mention in player_mentions {
            let mention = mention.to_lowercase();
            if names
                .iter()
                .any(|n| n.contains(&mention) || mention.contains(n.as_str()))
            {
                total += 5;
            }
        }
    }

    total + recency_bonus(doc.created_at, now)
}

/// A document paired with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: KnowledgeDocument,
    pub score: u32,
}

/// Score every candidate, drop zero scores, and order by score descending.
///
/// The sort is stable, so equal scores keep the order the candidates were
/// retrieved in.
pub fn rank(
    candidates: Vec<KnowledgeDocument>,
    terms: &BTreeSet<String>,
    player_mentions: &[String],
    now: DateTime<Utc>,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = candidates
        .into_iter()
        .map(|document| {
            let score = score(&document, terms, player_mentions, now);
            ScoredDocument { document, score }
        })
        .filter(|s| s.score > 0)
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}
