//! Core data models used throughout PPR Expert.
//!
//! These types represent the player snapshot pulled from Sleeper, the
//! knowledge documents used for retrieval, and the chat messages that flow
//! through the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Rank assigned to players the provider has not ranked.
pub const UNRANKED: i64 = 999_999;

/// An NFL player as reported by the player-data provider.
///
/// Most fields are optional because the provider omits them for team
/// defenses, retired players and free agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub player_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub injury_status: Option<String>,
    #[serde(default)]
    pub injury_body_part: Option<String>,
    #[serde(default)]
    pub search_rank: Option<i64>,
    #[serde(default)]
    pub fantasy_positions: Option<Vec<String>>,
    #[serde(default)]
    pub years_exp: Option<u32>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
}

impl Player {
    /// Full name, falling back to `first last`, then to the player id.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(only), None) | (None, Some(only)) => only.to_string(),
            (None, None) => self.player_id.clone(),
        }
    }

    pub fn rank(&self) -> i64 {
        self.search_rank.unwrap_or(UNRANKED)
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("Active")
    }

    pub fn team_or_fa(&self) -> &str {
        self.team.as_deref().unwrap_or("FA")
    }

    /// Case-insensitive substring match against full, first and last name.
    pub fn matches_name(&self, query_lower: &str) -> bool {
        [&self.full_name, &self.first_name, &self.last_name]
            .iter()
            .filter_map(|n| n.as_deref())
            .any(|n| n.to_lowercase().contains(query_lower))
    }
}

/// An entry of the provider's trending-adds list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingPlayer {
    pub player_id: String,
    #[serde(default)]
    pub count: u32,
}

/// Current season and week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeagueState {
    pub season: String,
    pub week: u32,
}

impl Default for LeagueState {
    fn default() -> Self {
        Self {
            season: "2024".to_string(),
            week: 1,
        }
    }
}

/// A complete copy of the provider's data at one point in time.
///
/// Snapshots are never patched: a refresh builds a new one and swaps it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub players: HashMap<String, Player>,
    pub season: String,
    pub week: u32,
    pub trending: Vec<TrendingPlayer>,
    pub created_at: DateTime<Utc>,
}

/// The kind of a knowledge document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    InjuryReport,
    Weather,
    ExpertArticle,
    PlayerNews,
    Rankings,
    AdvancedStats,
    MatchupAnalysis,
}

impl KnowledgeType {
    pub const ALL: [KnowledgeType; 7] = [
        KnowledgeType::InjuryReport,
        KnowledgeType::Weather,
        KnowledgeType::ExpertArticle,
        KnowledgeType::PlayerNews,
        KnowledgeType::Rankings,
        KnowledgeType::AdvancedStats,
        KnowledgeType::MatchupAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeType::InjuryReport => "injury_report",
            KnowledgeType::Weather => "weather",
            KnowledgeType::ExpertArticle => "expert_article",
            KnowledgeType::PlayerNews => "player_news",
            KnowledgeType::Rankings => "rankings",
            KnowledgeType::AdvancedStats => "advanced_stats",
            KnowledgeType::MatchupAnalysis => "matchup_analysis",
        }
    }
}

impl fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnowledgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("invalid knowledge type: '{}'", s))
    }
}

/// Optional descriptive fields attached to a knowledge document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A knowledge document before the store assigns its id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewKnowledge {
    #[serde(rename = "type")]
    pub kind: KnowledgeType,
    pub content: String,
    #[serde(default)]
    pub metadata: KnowledgeMetadata,
}

/// A stored knowledge document. Never modified after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: KnowledgeType,
    pub content: String,
    pub metadata: KnowledgeMetadata,
    pub created_at: DateTime<Utc>,
}

/// The intent of a chat message, used to narrow knowledge search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    StartSit,
    Waiver,
    Trade,
    Matchup,
    Injury,
    General,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::StartSit => "start_sit",
            ContextType::Waiver => "waiver",
            ContextType::Trade => "trade",
            ContextType::Matchup => "matchup",
            ContextType::Injury => "injury",
            ContextType::General => "general",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_sit" => Ok(ContextType::StartSit),
            "waiver" => Ok(ContextType::Waiver),
            "trade" => Ok(ContextType::Trade),
            "matchup" => Ok(ContextType::Matchup),
            "injury" => Ok(ContextType::Injury),
            "general" => Ok(ContextType::General),
            other => anyhow::bail!("invalid context type: '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

/// One turn of a conversation, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
