//! Time-boxed player data cache.
//!
//! [`DataCache`] holds the latest [`CachedSnapshot`] fetched from a
//! [`PlayerSource`] and serves it until it is older than the freshness
//! window (6 hours by default). After that the next read refreshes
//! synchronously.
//!
//! # Refresh policy
//!
//! 1. In-memory snapshot younger than the window → return it.
//! 2. No in-memory snapshot but a persisted one that is still fresh →
//!    adopt it without touching the network.
//! 3. Otherwise fetch. On success the new snapshot replaces the old one
//!    wholesale (and is persisted, best effort).
//! 4. If the fetch fails, serve whatever stale snapshot exists; with no
//!    snapshot at all, the error goes to the caller.
//!
//! There is no single-flight: concurrent reads of an expired cache may each
//! fetch. Every fetch builds an independent, complete snapshot and the last
//! write wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::{CachedSnapshot, Player, TrendingPlayer};
use crate::sleeper::PlayerSource;

/// Where a snapshot survives process restarts. Holds a single snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<CachedSnapshot>>;
    async fn save(&self, snapshot: &CachedSnapshot) -> Result<()>;
}

/// Summary of the cached snapshot for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub players_loaded: usize,
    pub trending_players: usize,
    pub season: String,
    pub week: u32,
    pub last_updated: DateTime<Utc>,
    pub age_seconds: i64,
    pub fresh: bool,
}

pub struct DataCache {
    source: Arc<dyn PlayerSource>,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<dyn SnapshotStore>>,
    freshness: Duration,
    // Never held across an await.
    current: RwLock<Option<Arc<CachedSnapshot>>>,
}

impl DataCache {
    pub fn new(source: Arc<dyn PlayerSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            persistence: None,
            freshness: Duration::hours(6),
            current: RwLock::new(None),
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_persistence(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.persistence = Some(store);
        self
    }

    fn current(&self) -> Option<Arc<CachedSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn install(&self, snapshot: Arc<CachedSnapshot>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }

    fn is_fresh(&self, snapshot: &CachedSnapshot, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.created_at) < self.freshness
    }

    /// The current snapshot, refreshing first if it has expired.
    pub async fn get_snapshot(&self) -> Result<Arc<CachedSnapshot>> {
        let now = self.clock.now();
        let mut stale = self.current();

        if let Some(snapshot) = &stale {
            if self.is_fresh(snapshot, now) {
                debug!("using cached player snapshot");
                return Ok(snapshot.clone());
            }
        } else if let Some(persisted) = self.load_persisted().await {
            if self.is_fresh(&persisted, now) {
                info!(
                    players = persisted.players.len(),
                    "adopted persisted player snapshot"
                );
                self.install(persisted.clone());
                return Ok(persisted);
            }
            stale = Some(persisted);
        }

        info!("player snapshot missing or stale, fetching fresh data");
        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match stale {
                Some(snapshot) => {
                    warn!(error = %e, "refresh failed, serving stale player snapshot");
                    Ok(snapshot)
                }
                None => Err(e),
            },
        }
    }

    /// Fetch from the source regardless of the current snapshot's age.
    pub async fn force_refresh(&self) -> Result<Arc<CachedSnapshot>> {
        info!("forced player snapshot refresh");
        self.refresh().await
    }

    async fn refresh(&self) -> Result<Arc<CachedSnapshot>> {
        let data = self.source.fetch_all().await?;
        let snapshot = Arc::new(CachedSnapshot {
            players: data.players,
            season: data.state.season,
            week: data.state.week,
            trending: data.trending,
            created_at: self.clock.now(),
        });

        self.install(snapshot.clone());
        info!(
            players = snapshot.players.len(),
            trending = snapshot.trending.len(),
            season = %snapshot.season,
            week = snapshot.week,
            "player snapshot refreshed"
        );

        if let Some(store) = &self.persistence {
            if let Err(e) = store.save(&snapshot).await {
                warn!(error = %e, "failed to persist player snapshot");
            }
        }

        Ok(snapshot)
    }

    async fn load_persisted(&self) -> Option<Arc<CachedSnapshot>> {
        let store = self.persistence.as_ref()?;
        match store.load().await {
            Ok(found) => found.map(Arc::new),
            Err(e) => {
                warn!(error = %e, "failed to load persisted player snapshot");
                None
            }
        }
    }

    /// Adopt the persisted snapshot, whatever its age, when nothing is held
    /// in memory. Returns whether a snapshot is now held. Never fetches.
    pub async fn restore(&self) -> bool {
        if self.current().is_some() {
            return true;
        }
        match self.load_persisted().await {
            Some(snapshot) => {
                self.install(snapshot);
                true
            }
            None => false,
        }
    }

    /// Describe the in-memory snapshot. Never fetches.
    pub fn status(&self) -> Option<CacheStatus> {
        let snapshot = self.current()?;
        let now = self.clock.now();
        Some(CacheStatus {
            players_loaded: snapshot.players.len(),
            trending_players: snapshot.trending.len(),
            season: snapshot.season.clone(),
            week: snapshot.week,
            last_updated: snapshot.created_at,
            age_seconds: now.signed_duration_since(snapshot.created_at).num_seconds(),
            fresh: self.is_fresh(&snapshot, now),
        })
    }

    pub async fn get_player(&self, player_id: &str) -> Result<Option<Player>> {
        Ok(self.get_snapshot().await?.players.get(player_id).cloned())
    }

    pub async fn search_players(
        &self,
        query: &str,
        position: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Player>> {
        Ok(self.get_snapshot().await?.search_players(query, position, limit))
    }

    pub async fn list_players(&self, position: Option<&str>, limit: usize) -> Result<Vec<Player>> {
        Ok(self.get_snapshot().await?.list_players(position, limit))
    }

    pub async fn players_by_ids(&self, ids: &[String]) -> Result<Vec<Player>> {
        Ok(self.get_snapshot().await?.players_by_ids(ids))
    }

    pub async fn trending(&self) -> Result<Vec<TrendingPlayer>> {
        Ok(self.get_snapshot().await?.trending.clone())
    }
}

fn by_rank(players: &mut [Player]) {
    players.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.player_id.cmp(&b.player_id)));
}

fn position_matches(player: &Player, position: Option<&str>) -> bool {
    match position {
        Some(pos) => player
            .position
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(pos)),
        None => true,
    }
}

impl CachedSnapshot {
    /// Players whose full, first or last name contains `query`
    /// (case-insensitive), best search rank first.
    pub fn search_players(&self, query: &str, position: Option<&str>, limit: usize) -> Vec<Player> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut found: Vec<Player> = self
            .players
            .values()
            .filter(|p| p.matches_name(&needle) && position_matches(p, position))
            .cloned()
            .collect();
        by_rank(&mut found);
        found.truncate(limit);
        found
    }

    pub fn list_players(&self, position: Option<&str>, limit: usize) -> Vec<Player> {
        let mut found: Vec<Player> = self
            .players
            .values()
            .filter(|p| position_matches(p, position))
            .cloned()
            .collect();
        by_rank(&mut found);
        found.truncate(limit);
        found
    }

    /// Players for the given ids, in request order; unknown ids are skipped.
    pub fn players_by_ids(&self, ids: &[String]) -> Vec<Player> {
        ids.iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::LeagueState;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    fn player(id: &str, name: &str, pos: &str, rank: Option<i64>) -> Player {
        let mut parts = name.splitn(2, ' ');
        Player {
            player_id: id.to_string(),
            full_name: Some(name.to_string()),
            first_name: parts.next().map(str::to_string),
            last_name: parts.next().map(str::to_string),
            position: Some(pos.to_string()),
            team: Some("LAR".to_string()),
            status: Some("Active".to_string()),
            injury_status: None,
            injury_body_part: None,
            search_rank: rank,
            fantasy_positions: None,
            years_exp: None,
            age: None,
            height: None,
            weight: None,
        }
    }

    #[async_trait]
    impl PlayerSource for CountingSource {
        async fn fetch_players(&self) -> Result<HashMap<String, Player>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            let mut players = HashMap::new();
            players.insert("1".into(), player("1", "Cooper Kupp", "WR", Some(40)));
            players.insert("2".into(), player("2", "Puka Nacua", "WR", Some(20)));
            players.insert("3".into(), player("3", "Kyren Williams", "RB", None));
            Ok(players)
        }

        async fn fetch_state(&self) -> Result<LeagueState> {
            Ok(LeagueState {
                season: "2024".into(),
                week: 5,
            })
        }

        async fn fetch_trending(&self) -> Result<Vec<TrendingPlayer>> {
            Ok(vec![TrendingPlayer {
                player_id: "2".into(),
                count: 100,
            }])
        }
    }

    #[derive(Default)]
    struct MemorySnapshots {
        slot: Mutex<Option<CachedSnapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for MemorySnapshots {
        async fn load(&self) -> Result<Option<CachedSnapshot>> {
            Ok(self.slot.lock().unwrap().clone())
        }
        async fn save(&self, snapshot: &CachedSnapshot) -> Result<()> {
            *self.slot.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn setup() -> (Arc<CountingSource>, Arc<ManualClock>, DataCache) {
        let source = Arc::new(CountingSource::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = DataCache::new(source.clone(), clock.clone());
        (source, clock, cache)
    }

    #[tokio::test]
    async fn test_fresh_snapshot_served_without_second_fetch() {
        let (source, clock, cache) = setup();
        let first = cache.get_snapshot().await.unwrap();
        clock.advance(Duration::hours(5) + Duration::minutes(59));
        let second = cache.get_snapshot().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_triggers_exactly_one_refresh() {
        let (source, clock, cache) = setup();
        let first = cache.get_snapshot().await.unwrap();
        clock.advance(Duration::hours(6));
        let second = cache.get_snapshot().await.unwrap();
        let third = cache.get_snapshot().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_ignores_age() {
        let (source, _clock, cache) = setup();
        cache.get_snapshot().await.unwrap();
        cache.force_refresh().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_without_snapshot_propagates() {
        let (source, _clock, cache) = setup();
        source.fail.store(true, Ordering::SeqCst);
        let err = cache.get_snapshot().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(cache.status().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_snapshot() {
        let (source, clock, cache) = setup();
        let first = cache.get_snapshot().await.unwrap();
        clock.advance(Duration::hours(7));
        source.fail.store(true, Ordering::SeqCst);

        let served = cache.get_snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &served));
        assert!(!cache.status().unwrap().fresh);
    }

    #[tokio::test]
    async fn test_fresh_persisted_snapshot_adopted_without_fetch() {
        let source = Arc::new(CountingSource::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemorySnapshots::default());

        let warm = DataCache::new(source.clone(), clock.clone()).with_persistence(store.clone());
        warm.get_snapshot().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // A new process reading the same store.
        clock.advance(Duration::hours(1));
        let cold = DataCache::new(source.clone(), clock.clone()).with_persistence(store.clone());
        let snapshot = cold.get_snapshot().await.unwrap();
        assert_eq!(snapshot.players.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restore_adopts_stale_snapshot_without_fetch() {
        let source = Arc::new(CountingSource::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemorySnapshots::default());
        DataCache::new(source.clone(), clock.clone())
            .with_persistence(store.clone())
            .get_snapshot()
            .await
            .unwrap();

        clock.advance(Duration::hours(30));
        let cold = DataCache::new(source.clone(), clock.clone()).with_persistence(store);
        assert!(cold.status().is_none());
        assert!(cold.restore().await);

        let status = cold.status().unwrap();
        assert!(!status.fresh);
        assert_eq!(status.players_loaded, 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_players_orders_by_rank() {
        let (_source, _clock, cache) = setup();
        let found = cache.search_players("k", None, 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.player_id.as_str()).collect();
        // Nacua (20), Kupp (40), Williams (unranked)
        assert_eq!(ids, vec!["2", "1", "3"]);

        let rbs = cache.search_players("k", Some("rb"), 10).await.unwrap();
        assert_eq!(rbs.len(), 1);
        assert_eq!(rbs[0].player_id, "3");
    }

    #[tokio::test]
    async fn test_players_by_ids_skips_unknown() {
        let (_source, _clock, cache) = setup();
        let found = cache
            .players_by_ids(&["3".to_string(), "nope".to_string(), "1".to_string()])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }
}
