//! Player data source.
//!
//! [`PlayerSource`] is the seam between the cache and the outside world.
//! [`SleeperClient`] implements it against the public Sleeper API, which is
//! read-only and needs no key:
//!
//! | Endpoint | Used for |
//! |----------|----------|
//! | `GET /players/nfl` | full roster keyed by player id |
//! | `GET /state/nfl` | current season and week |
//! | `GET /players/nfl/trending/add` | trending pickups |
//!
//! No retries: a failed fetch surfaces to the cache, which decides whether a
//! stale snapshot can be served instead.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SleeperConfig;
use crate::models::{LeagueState, Player, TrendingPlayer};

/// Everything one refresh pulls from the provider.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub players: HashMap<String, Player>,
    pub state: LeagueState,
    pub trending: Vec<TrendingPlayer>,
}

/// A read-only provider of player data.
#[async_trait]
pub trait PlayerSource: Send + Sync {
    async fn fetch_players(&self) -> Result<HashMap<String, Player>>;
    async fn fetch_state(&self) -> Result<LeagueState>;
    async fn fetch_trending(&self) -> Result<Vec<TrendingPlayer>>;

    /// Fetch all three datasets concurrently. Fails if any of them fails.
    async fn fetch_all(&self) -> Result<SourceData> {
        let (players, state, trending) = tokio::try_join!(
            self.fetch_players(),
            self.fetch_state(),
            self.fetch_trending()
        )?;
        Ok(SourceData {
            players,
            state,
            trending,
        })
    }
}

/// Client for `https://api.sleeper.app/v1`.
pub struct SleeperClient {
    client: reqwest::Client,
    base_url: String,
    lookback_hours: u32,
    trending_limit: u32,
}

impl SleeperClient {
    pub fn new(config: &SleeperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lookback_hours: config.trending_lookback_hours,
            trending_limit: config.trending_limit,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Sleeper API error {} for {}: {}", status, path, body);
        }
        Ok(response.json().await?)
    }
}

/// `/state/nfl` carries many fields; only these two matter here.
#[derive(Debug, Deserialize)]
struct RawState {
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    week: Option<u32>,
}

impl From<RawState> for LeagueState {
    fn from(raw: RawState) -> Self {
        let defaults = LeagueState::default();
        LeagueState {
            season: raw
                .season
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.season),
            week: raw.week.filter(|w| *w > 0).unwrap_or(defaults.week),
        }
    }
}

#[async_trait]
impl PlayerSource for SleeperClient {
    async fn fetch_players(&self) -> Result<HashMap<String, Player>> {
        self.get_json("/players/nfl").await
    }

    async fn fetch_state(&self) -> Result<LeagueState> {
        let raw: RawState = self.get_json("/state/nfl").await?;
        Ok(raw.into())
    }

    async fn fetch_trending(&self) -> Result<Vec<TrendingPlayer>> {
        let path = format!(
            "/players/nfl/trending/add?lookback_hours={}&limit={}",
            self.lookback_hours, self.trending_limit
        );
        self.get_json(&path).await
    }
}
