//! Service wiring shared by the CLI and the HTTP server.

use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;

use crate::cache::DataCache;
use crate::chat::ChatOrchestrator;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::knowledge::KnowledgeBase;
use crate::llm::{create_model, LanguageModel};
use crate::sleeper::{PlayerSource, SleeperClient};
use crate::store::sqlite::SqliteStore;
use crate::{db, migrate};

/// Every long-lived component, cheap to clone.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub cache: Arc<DataCache>,
    pub knowledge: Arc<KnowledgeBase>,
    pub chat: Arc<ChatOrchestrator>,
}

impl App {
    /// Wire already-built components together.
    pub fn new(
        config: Arc<Config>,
        cache: Arc<DataCache>,
        knowledge: Arc<KnowledgeBase>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let chat = ChatOrchestrator::new(cache.clone(), knowledge.clone(), model)
            .with_timeout(std::time::Duration::from_secs(config.llm.timeout_secs))
            .with_max_results(config.knowledge.chat_max_results);
        Self {
            config,
            cache,
            knowledge,
            chat: Arc::new(chat),
        }
    }

    /// Production wiring: SQLite store (migrated on open), Sleeper source,
    /// system clock and the configured language model.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn PlayerSource> = Arc::new(SleeperClient::new(&config.sleeper)?);
        let model: Arc<dyn LanguageModel> = Arc::from(create_model(&config.llm)?);
        Self::with_source(config, source, model).await
    }

    /// Like [`from_config`](Self::from_config) with the player source and
    /// model supplied by the caller.
    pub async fn with_source(
        config: &Config,
        source: Arc<dyn PlayerSource>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let store = SqliteStore::new(pool);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut cache = DataCache::new(source, clock.clone())
            .with_freshness(Duration::hours(config.cache.freshness_hours));
        if config.cache.persist {
            cache = cache.with_persistence(Arc::new(store.clone()));
        }
        let knowledge = KnowledgeBase::new(Arc::new(store), clock);

        Ok(Self::new(
            Arc::new(config.clone()),
            Arc::new(cache),
            Arc::new(knowledge),
            model,
        ))
    }
}
