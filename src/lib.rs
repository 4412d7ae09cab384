//! # PPR Expert
//!
//! A fantasy-football chat assistant for PPR (points per reception) leagues.
//!
//! Questions are answered by a language model whose prompt is enriched with
//! live player data from the Sleeper API and with short knowledge documents
//! picked by keyword relevance. When the model is unavailable the assistant
//! answers from deterministic templates instead of failing.
//!
//! ## Architecture
//!
//! ```text
//! Sleeper API ──▶ DataCache ─────┐
//!                                ├──▶ ChatOrchestrator ──▶ LanguageModel
//! SQLite ──────▶ KnowledgeBase ──┘           ▲
//!                                            │
//!                                       CLI / HTTP
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ppr init                          # create database
//! ppr knowledge init                # seed baseline documents
//! ppr refresh                       # pull player data
//! ppr chat "Should I start Cooper Kupp this week?"
//! ppr serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`clock`] | Injectable time source |
//! | [`sleeper`] | Player data source |
//! | [`cache`] | Time-boxed player snapshot cache |
//! | [`store`] | Knowledge document storage |
//! | [`scoring`] | Keyword relevance scoring |
//! | [`knowledge`] | Knowledge add, search and rendering |
//! | [`chunk`] | Document chunking and upload |
//! | [`ingest`] | Seed data, daily ingestion, file uploads |
//! | [`mentions`] | Player mention detection |
//! | [`intent`] | Message classification and fallback answers |
//! | [`prompt`] | Prompt assembly |
//! | [`llm`] | Language model clients |
//! | [`chat`] | Chat orchestration |
//! | [`app`] | Component wiring |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod app;
pub mod cache;
pub mod chat;
pub mod chunk;
pub mod clock;
pub mod config;
pub mod db;
pub mod ingest;
pub mod intent;
pub mod knowledge;
pub mod llm;
pub mod mentions;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod scoring;
pub mod server;
pub mod sleeper;
pub mod store;
