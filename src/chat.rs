//! Chat orchestration.
//!
//! [`ChatOrchestrator::handle`] runs one chat turn:
//!
//! 1. Reject blank messages.
//! 2. Read the player snapshot (failure → continue without player data).
//! 3. Resolve player mentions against the snapshot.
//! 4. Classify the message.
//! 5. Search knowledge (failure → continue without knowledge).
//! 6. Assemble the prompt.
//! 7. Call the model under a deadline. A timeout, an error or an empty
//!    completion switches to the fallback template for the classified
//!    context.
//! 8. Build the response with provenance.
//!
//! Only step 1 can fail the request. Nothing is retried.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::DataCache;
use crate::intent;
use crate::knowledge::{render_context, KnowledgeBase, KnowledgeQuery};
use crate::llm::LanguageModel;
use crate::mentions::MentionDetector;
use crate::models::{CachedSnapshot, ChatMessage, ContextType, LeagueState, Player};
use crate::prompt::{self, PlayerContext, PromptInput};
use crate::scoring::ScoredDocument;

pub const SUCCESS_CONFIDENCE: f64 = 0.85;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;
pub const FALLBACK_SOURCE: &str = "PPR Fallback Expert";
pub const FALLBACK_NOTE: &str = "Using fallback response - AI service temporarily unavailable";

const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub status: Option<String>,
}

impl From<&Player> for PlayerSummary {
    fn from(p: &Player) -> Self {
        Self {
            id: p.player_id.clone(),
            name: p.display_name(),
            position: p.position.clone(),
            team: p.team.clone(),
            status: p.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub season: String,
    pub week: u32,
    pub players_scanned: String,
    pub context_type: ContextType,
    pub knowledge_documents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub confidence: f64,
    pub sources: Vec<String>,
    pub players_analyzed: Vec<PlayerSummary>,
    pub context_data: ContextSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ChatResponse {
    pub fn is_fallback(&self) -> bool {
        self.note.is_some()
    }
}

pub struct ChatOrchestrator {
    cache: Arc<DataCache>,
    knowledge: Arc<KnowledgeBase>,
    model: Arc<dyn LanguageModel>,
    mentions: MentionDetector,
    timeout: Duration,
    max_results: usize,
}

impl ChatOrchestrator {
    pub fn new(
        cache: Arc<DataCache>,
        knowledge: Arc<KnowledgeBase>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            cache,
            knowledge,
            model,
            mentions: MentionDetector::new(),
            timeout: Duration::from_secs(30),
            max_results: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub async fn handle(&self, req: ChatRequest) -> Result<ChatResponse, ChatError> {
        let message = req.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let snapshot = match self.cache.get_snapshot().await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "player data unavailable, continuing without it");
                None
            }
        };

        let players = snapshot
            .as_deref()
            .map(|s| self.mentions.resolve(message, s))
            .unwrap_or_default();
        let context_type = intent::classify(message);
        let knowledge = self.search_knowledge(message, context_type, &players).await;

        let (season, week) = season_and_week(snapshot.as_deref());
        let player_context = snapshot.as_deref().map(PlayerContext::from_snapshot);
        let knowledge_block = (!knowledge.is_empty()).then(|| render_context(&knowledge));
        let history_start = req.messages.len().saturating_sub(HISTORY_WINDOW);

        let prompt = prompt::build(&PromptInput {
            user_message: message,
            history: &req.messages[history_start..],
            player_context: player_context.as_ref(),
            mentioned_players: &players,
            knowledge: knowledge_block.as_deref(),
        });

        info!(
            context = %context_type,
            players = players.len(),
            knowledge = knowledge.len(),
            live_data = snapshot.is_some(),
            "chat request"
        );

        let context_data = ContextSummary {
            season: season.clone(),
            week,
            players_scanned: if snapshot.is_some() {
                "Live data integrated".to_string()
            } else {
                "Basic data only".to_string()
            },
            context_type,
            knowledge_documents: knowledge.len(),
        };
        let players_analyzed = players.iter().map(PlayerSummary::from).collect();

        match self.generate(&prompt, &season).await {
            Some(text) => {
                let mut sources = vec![self.model.label().to_string()];
                if snapshot.is_some() {
                    sources.push(format!("Sleeper API ({} Season, Week {})", season, week));
                }
                if !knowledge.is_empty() {
                    sources.push(format!("Knowledge Base ({} documents)", knowledge.len()));
                }
                Ok(ChatResponse {
                    message: text,
                    confidence: SUCCESS_CONFIDENCE,
                    sources,
                    players_analyzed,
                    context_data,
                    note: None,
                })
            }
            None => {
                let source = match &snapshot {
                    Some(s) => format!("{} ({} Season Data)", FALLBACK_SOURCE, s.season),
                    None => FALLBACK_SOURCE.to_string(),
                };
                Ok(ChatResponse {
                    message: intent::fallback_response(context_type, &season),
                    confidence: FALLBACK_CONFIDENCE,
                    sources: vec![source],
                    players_analyzed,
                    context_data,
                    note: Some(FALLBACK_NOTE.to_string()),
                })
            }
        }
    }

    async fn search_knowledge(
        &self,
        message: &str,
        context_type: ContextType,
        players: &[Player],
    ) -> Vec<ScoredDocument> {
        let names = players.iter().map(Player::display_name).collect();
        let query = KnowledgeQuery::new(message, self.max_results)
            .context(context_type)
            .mentions(names);
        match self.knowledge.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "knowledge search failed, continuing without it");
                Vec::new()
            }
        }
    }

    /// `None` means the fallback should be used.
    async fn generate(&self, prompt: &str, season: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.model.generate(prompt, season)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => {
                warn!(model = self.model.label(), "empty completion, using fallback");
                None
            }
            Ok(Err(e)) => {
                warn!(model = self.model.label(), error = %e, "model call failed, using fallback");
                None
            }
            Err(_) => {
                warn!(
                    model = self.model.label(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "model call timed out, using fallback"
                );
                None
            }
        }
    }
}

fn season_and_week(snapshot: Option<&CachedSnapshot>) -> (String, u32) {
    match snapshot {
        Some(s) => (s.season.clone(), s.week),
        None => {
            let d = LeagueState::default();
            (d.season, d.week)
        }
    }
}
