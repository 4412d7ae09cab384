//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` and `[server]` is optional and falls back to
//! the defaults below. API keys are never read from the file; the LLM and
//! weather clients pick them up from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub sleeper: SleeperConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SleeperConfig {
    #[serde(default = "default_sleeper_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_lookback_hours")]
    pub trending_lookback_hours: u32,
    #[serde(default = "default_trending_limit")]
    pub trending_limit: u32,
}

impl Default for SleeperConfig {
    fn default() -> Self {
        Self {
            base_url: default_sleeper_url(),
            timeout_secs: default_timeout_secs(),
            trending_lookback_hours: default_lookback_hours(),
            trending_limit: default_trending_limit(),
        }
    }
}

fn default_sleeper_url() -> String {
    "https://api.sleeper.app/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_lookback_hours() -> u32 {
    24
}
fn default_trending_limit() -> u32 {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: i64,
    /// Keep a copy of the snapshot in SQLite so restarts skip the fetch.
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_hours: default_freshness_hours(),
            persist: default_persist(),
        }
    }
}

fn default_freshness_hours() -> i64 {
    6
}
fn default_persist() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_chat_max_results")]
    pub chat_max_results: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            chat_max_results: default_chat_max_results(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_chat_max_results() -> usize {
    3
}
fn default_chunk_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Override for the provider's API root (useful behind a proxy).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_temperature() -> f64 {
    0.7
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A configuration with every optional section defaulted and the
    /// database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/ppr.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:3000".to_string(),
            },
            sleeper: SleeperConfig::default(),
            cache: CacheConfig::default(),
            knowledge: KnowledgeConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.cache.freshness_hours <= 0 {
        anyhow::bail!("cache.freshness_hours must be > 0");
    }

    if config.knowledge.default_max_results < 1 {
        anyhow::bail!("knowledge.default_max_results must be >= 1");
    }
    if config.knowledge.chat_max_results < 1 {
        anyhow::bail!("knowledge.chat_max_results must be >= 1");
    }
    if config.knowledge.chunk_size == 0 {
        anyhow::bail!("knowledge.chunk_size must be > 0");
    }

    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    match config.llm.provider.as_str() {
        "disabled" | "replicate" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, replicate, or openai.",
            other
        ),
    }

    Ok(())
}
