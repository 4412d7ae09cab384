//! Player mention detection.
//!
//! Candidates come from two places, in this order:
//!
//! 1. Every `Firstname Lastname` pair in the message (two capitalised words).
//! 2. A fixed list of well-known nicknames and surnames, matched
//!    case-insensitively on word boundaries.
//!
//! Only the first five candidates are resolved against the player snapshot,
//! three search hits each. Resolved players are deduplicated by id and capped
//! at ten.

use regex::Regex;
use std::collections::HashSet;

use crate::models::{CachedSnapshot, Player};

const NICKNAMES: &[&str] = &[
    "McCaffrey",
    "CMC",
    "Mahomes",
    "Kelce",
    "Jefferson",
    "Chase",
    "Allen",
    "Burrow",
    "Lamar",
    "Hill",
];

const MAX_CANDIDATES: usize = 5;
const HITS_PER_CANDIDATE: usize = 3;
const MAX_PLAYERS: usize = 10;

pub struct MentionDetector {
    full_name: Option<Regex>,
    nicknames: Vec<Regex>,
}

impl Default for MentionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MentionDetector {
    pub fn new() -> Self {
        Self {
            full_name: Regex::new(r"[A-Z][a-z]+ [A-Z][a-z]+").ok(),
            nicknames: NICKNAMES
                .iter()
                .filter_map(|n| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(n))).ok())
                .collect(),
        }
    }

    /// Raw name candidates in detection order. May contain duplicates.
    pub fn candidates(&self, message: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .full_name
            .iter()
            .flat_map(|re| re.find_iter(message))
            .map(|m| m.as_str().to_string())
            .collect();
        for re in &self.nicknames {
            found.extend(re.find_iter(message).map(|m| m.as_str().to_string()));
        }
        found
    }

    /// Resolve candidates against `snapshot`.
    pub fn resolve(&self, message: &str, snapshot: &CachedSnapshot) -> Vec<Player> {
        let mut seen = HashSet::new();
        let mut players = Vec::new();
        for name in self.candidates(message).into_iter().take(MAX_CANDIDATES) {
            for player in snapshot.search_players(&name, None, HITS_PER_CANDIDATE) {
                if seen.insert(player.player_id.clone()) {
                    players.push(player);
                }
            }
        }
        players.truncate(MAX_PLAYERS);
        players
    }
}
