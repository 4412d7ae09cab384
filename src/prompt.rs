//! Prompt assembly.
//!
//! [`build`] concatenates the blocks below in a fixed order. Optional blocks
//! are skipped entirely when empty.
//!
//! ```text
//! SYSTEM_PROMPT
//! CURRENT <season> NFL DATA (Week <n>): ...        player context
//! Specific players mentioned: ...                  resolved mentions
//! ADDITIONAL FANTASY FOOTBALL CONTEXT: ...         knowledge search
//! Previous conversation: ...                       history
//! User: <message>
//!
//! Assistant:
//! ```

use crate::models::{CachedSnapshot, ChatMessage, Player};

pub const SYSTEM_PROMPT: &str = "You are the ultimate PPR (Points Per Reception) Fantasy Football Expert. You specialize in helping users dominate their PPR leagues where receptions are worth 1 point each.

PPR SCORING SYSTEM:
- Passing: 1 point per 25 yards, 4 points per TD
- Rushing: 1 point per 10 yards, 6 points per TD
- Receiving: 1 point per 10 yards, 6 points per TD, 1 point per reception
- Defense/ST: Variable scoring for TDs, turnovers, etc.

KEY PPR PRINCIPLES:
1. RECEPTIONS ARE KING: Players who catch more passes are more valuable
2. Target Share Matters: High-target players are PPR gold
3. Volume > Efficiency: 8 catches for 60 yards (14.0 pts) beats 3 catches for 80 yards (11.0 pts)
4. Slot receivers and pass-catching RBs are premium assets
5. Red zone touches + target share = PPR excellence

PLAYER EVALUATION FOCUS:
- Targets per game and target share percentage
- Receptions per game (most important stat)
- Air yards and average depth of target
- Snap count and route participation
- Matchup analysis: opponent pass defense vs position
- Game script considerations (trailing teams throw more)

EXPERT ANALYSIS AREAS:
- Start/Sit decisions with PPR context
- Waiver wire pickups focusing on target trends
- Trade analysis emphasizing reception volume
- Matchup breakdowns highlighting passing game opportunities
- Weekly rankings with PPR-specific weightings

Always provide confident, data-driven advice that prioritizes reception volume and target opportunity in PPR scoring format.";

/// Short instruction sent alongside the prompt to providers that accept a
/// separate system message.
pub fn model_system_prompt(season: &str) -> String {
    format!(
        "You are a helpful assistant specialized in PPR fantasy football analysis. Use the current {} season data provided in the prompt and avoid referencing outdated player information.",
        season
    )
}

const QB_POOL: usize = 10;
const RB_POOL: usize = 15;
const WR_POOL: usize = 20;
const TE_POOL: usize = 10;
const TRENDING_POOL: usize = 5;

/// Top players per position and trending pickups, taken from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct PlayerContext {
    pub season: String,
    pub week: u32,
    pub top_qbs: Vec<Player>,
    pub top_rbs: Vec<Player>,
    pub top_wrs: Vec<Player>,
    pub top_tes: Vec<Player>,
    /// Display labels for trending adds: `Name (TEAM)`, or the bare id when
    /// the player is not in the snapshot.
    pub trending: Vec<String>,
}

impl PlayerContext {
    /// Active, rostered QB/RB/WR/TE players ordered by search rank.
    pub fn from_snapshot(snapshot: &CachedSnapshot) -> Self {
        let mut active: Vec<&Player> = snapshot
            .players
            .values()
            .filter(|p| {
                p.is_active()
                    && p.team.is_some()
                    && matches!(p.position.as_deref(), Some("QB" | "RB" | "WR" | "TE"))
            })
            .collect();
        active.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.player_id.cmp(&b.player_id)));

        let top = |pos: &str, n: usize| -> Vec<Player> {
            active
                .iter()
                .filter(|p| p.position.as_deref() == Some(pos))
                .take(n)
                .map(|p| (*p).clone())
                .collect()
        };

        let trending = snapshot
            .trending
            .iter()
            .take(TRENDING_POOL)
            .map(|t| match snapshot.players.get(&t.player_id) {
                Some(p) => label(p),
                None => t.player_id.clone(),
            })
            .collect();

        Self {
            season: snapshot.season.clone(),
            week: snapshot.week,
            top_qbs: top("QB", QB_POOL),
            top_rbs: top("RB", RB_POOL),
            top_wrs: top("WR", WR_POOL),
            top_tes: top("TE", TE_POOL),
            trending,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("\n\nCURRENT {} NFL DATA (Week {}):", self.season, self.week);
        for (heading, players, shown) in [
            ("Top QBs", &self.top_qbs, 5),
            ("Top RBs", &self.top_rbs, 8),
            ("Top WRs", &self.top_wrs, 10),
            ("Top TEs", &self.top_tes, 5),
        ] {
            if !players.is_empty() {
                let names: Vec<String> = players.iter().take(shown).map(label).collect();
                out.push_str(&format!("\n\n{}: {}", heading, names.join(", ")));
            }
        }
        if !self.trending.is_empty() {
            out.push_str(&format!("\n\nTrending Pickups: {}", self.trending.join(", ")));
        }
        out.push_str(&format!(
            "\n\nIMPORTANT: Use the above CURRENT {} data in your analysis. Do not reference outdated player team information.",
            self.season
        ));
        out
    }
}

fn label(p: &Player) -> String {
    format!("{} ({})", p.display_name(), p.team_or_fa())
}

pub struct PromptInput<'a> {
    pub user_message: &'a str,
    pub history: &'a [ChatMessage],
    pub player_context: Option<&'a PlayerContext>,
    pub mentioned_players: &'a [Player],
    /// Already-rendered knowledge block.
    pub knowledge: Option<&'a str>,
}

pub fn build(input: &PromptInput<'_>) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);

    if let Some(ctx) = input.player_context {
        prompt.push_str(&ctx.render());
    }

    if !input.mentioned_players.is_empty() {
        let players: Vec<String> = input
            .mentioned_players
            .iter()
            .map(|p| {
                format!(
                    "{} ({}, {}, Status: {})",
                    p.display_name(),
                    p.position.as_deref().unwrap_or("?"),
                    p.team_or_fa(),
                    p.status.as_deref().unwrap_or("Unknown")
                )
            })
            .collect();
        prompt.push_str("\n\nSpecific players mentioned: ");
        prompt.push_str(&players.join(", "));
    }

    if let Some(knowledge) = input.knowledge.filter(|k| !k.trim().is_empty()) {
        prompt.push_str(knowledge);
    }

    if !input.history.is_empty() {
        let lines: Vec<String> = input
            .history
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect();
        prompt.push_str("\n\nPrevious conversation:\n");
        prompt.push_str(&lines.join("\n"));
    }

    prompt.push_str(&format!("\n\nUser: {}\n\nAssistant:", input.user_message));
    prompt
}
