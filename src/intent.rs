//! Message classification and canned fallback answers.

use crate::models::ContextType;

/// Classify a chat message by keyword. The first matching rule wins:
///
/// | Keywords | Context |
/// |----------|---------|
/// | `start`, `sit` | start/sit |
/// | `waiver`, `pickup` | waiver |
/// | `trade` | trade |
/// | `matchup`, `vs` | matchup |
/// | `injur`, `hurt` | injury |
///
/// Matching is on lowercase substrings, so "position" counts as `sit`.
pub fn classify(message: &str) -> ContextType {
    let lower = message.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["start", "sit"]) {
        ContextType::StartSit
    } else if has(&["waiver", "pickup"]) {
        ContextType::Waiver
    } else if has(&["trade"]) {
        ContextType::Trade
    } else if has(&["matchup", "vs"]) {
        ContextType::Matchup
    } else if has(&["injur", "hurt"]) {
        ContextType::Injury
    } else {
        ContextType::General
    }
}

/// Deterministic answer used when the language model is unavailable.
pub fn fallback_response(context: ContextType, season: &str) -> String {
    match context {
        ContextType::StartSit => format!(
            "**🏈 PPR Start/Sit Advice ({season} Season):**

For current PPR decisions, I prioritize these factors:

📊 **Target Share Leaders** (15%+ team targets)
- Slot receivers with 6+ targets/game
- Pass-catching RBs (3+ targets minimum)
- Red zone target hogs

🎯 **Current Week Factors:**
- Game script (trailing = more throws)
- Opponent pass defense rankings
- Injury reports affecting target distribution
- Weather conditions for passing games

**Quick PPR Formula:**
Targets + Receptions + Favorable Matchup = Start
Low targets + Boom/bust profile = Consider benching

Share specific players for detailed {season} analysis!"
        ),
        ContextType::Waiver => format!(
            "**🔥 PPR Waiver Wire Strategy (Current Week):**

**Target These PPR Indicators:**
• Rising target trends (3+ consecutive weeks)
• Slot receiver promotions due to injuries
• Pass-catching RB opportunities
• Teams with 35+ pass attempts/game

**{season} Season Priorities:**
1. **High-Volume Slots** - WRs with 8+ targets
2. **Pass-Game RBs** - 4+ targets per game
3. **TE Streamers** - vs weak LB coverage
4. **Handcuff WRs** - injury replacements

**Avoid:** Deep threats with 3-4 targets, TD-dependent players

💡 **Pro Tip:** Check target share % over past 3 weeks - that's your PPR goldmine!

Need specific waiver suggestions for this week?"
        ),
        ContextType::Trade => format!(
            "**⚖️ PPR Trade Analysis ({season} Values):**

**PPR Value Multipliers:**
• **WR1s**: Premium due to target volume
• **Pass-catching RBs**: Dual-eligibility value
• **Elite TEs**: Positional scarcity + targets
• **High-target WR2s**: Often better than boom/bust WR1s

**{season} Trade Principles:**
- Targets > Air yards (volume beats big plays)
- Consistent 8+ targets > occasional 12+ targets
- Factor in team pass rate trends
- Consider playoff schedule (Weeks 15-17)

**Red Flags in PPR:**
- Players with <20% target share
- TD-dependent without reception floor
- Injury-prone high-target players

Share your specific trade scenario for detailed PPR analysis!"
        ),
        ContextType::Matchup => format!(
            "**🎯 PPR Matchup Breakdown ({season} Season):**

**What Moves the Needle in PPR:**
• Opponent targets allowed to the position
• Slot coverage weaknesses
• Projected game script (underdogs throw more late)
• Pace of play and total plays per game

**Weather Check:**
- 15+ mph winds cut passing attempts noticeably
- Heavy rain or snow favors short targets and RB receptions

**Rule of Thumb:**
A high-target player in a tough matchup usually beats a low-target player in a great one.

Tell me the matchup and I'll break down the PPR angles!"
        ),
        ContextType::Injury => format!(
            "**🩺 PPR Injury Impact ({season} Season):**

**How Injuries Shift PPR Value:**
• Target share redistributes to the slot WR and pass-catching RB first
• Players returning from hamstring injuries often lose 15-20% of their targets in game one
• Questionable tags on game day: check snap counts before lock

**Action Plan:**
1. Identify the direct backup and the likely target vacuum
2. Prefer players with a guaranteed reception floor
3. Keep a handcuff on the bench for your top RB

Name the injured player and I'll walk through the PPR fallout!"
        ),
        ContextType::General => format!(
            "**🏈 PPR Fantasy Expert ({season} Season)**

I analyze **current NFL data** for PPR league domination!

**Live Data Focus:**
• 📊 Current target share leaders
• 🎯 Weekly matchup advantages
• 🔥 Trending waiver targets
• ⚖️ Real-time trade values
• 📈 {season} season projections

**PPR Specialties:**
- **Start/Sit** with current target trends
- **Waiver** pickups based on opportunity
- **Trades** emphasizing reception volume
- **Matchups** highlighting pass game spots
- **Rankings** weighted for PPR scoring

**{season} PPR Philosophy:**
\"In PPR, 7 catches for 50 yards (12.0 pts) beats 2 catches for 80 yards (10.0 pts)\"

What current PPR decision can I help with?"
        ),
    }
}
