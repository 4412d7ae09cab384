//! # PPR Expert CLI (`ppr`)
//!
//! ## Usage
//!
//! ```bash
//! ppr --config ./config/ppr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ppr init` | Create the SQLite database and run schema migrations |
//! | `ppr serve` | Start the HTTP API |
//! | `ppr refresh` | Force a player data refresh |
//! | `ppr status` | Show cache status and knowledge count |
//! | `ppr players <query>` | Search cached players |
//! | `ppr knowledge <action>` | Seed, ingest, add or search knowledge |
//! | `ppr upload <path>` | Chunk a file or directory into the knowledge base |
//! | `ppr chat "<message>"` | Ask one question |
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ppr_expert::app::App;
use ppr_expert::chat::ChatRequest;
use ppr_expert::config;
use ppr_expert::ingest::{self, UploadOptions, WeatherClient};
use ppr_expert::knowledge::{render_context, KnowledgeQuery};
use ppr_expert::migrate;
use ppr_expert::models::{ContextType, KnowledgeMetadata, KnowledgeType, NewKnowledge};
use ppr_expert::server;

/// PPR Expert: a fantasy-football chat assistant for PPR leagues.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ppr.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ppr",
    about = "PPR Expert: a fantasy-football chat assistant for PPR leagues",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ppr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the knowledge and snapshot
    /// tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Fetch fresh player data regardless of cache age.
    Refresh,

    /// Show the cached snapshot and knowledge document count.
    ///
    /// Never contacts the player data provider.
    Status,

    /// Search cached players by name.
    Players {
        query: String,

        /// Restrict to one position (QB, RB, WR, TE, ...).
        #[arg(long)]
        position: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Knowledge base actions.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Chunk a file, or every .md/.txt file under a directory, into the
    /// knowledge base.
    Upload {
        path: PathBuf,

        /// Document title. Defaults to the file name; ignored for directories.
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        source: Option<String>,

        /// Knowledge type for every chunk (default: expert_article).
        #[arg(long)]
        doc_type: Option<KnowledgeType>,

        /// Extra tag; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Ask one question and print the answer.
    Chat { message: String },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Write the baseline PPR strategy documents.
    Init,

    /// Run injury, expert and (with OPENWEATHER_API_KEY) weather ingestion.
    IngestDaily,

    /// Add one document.
    Add {
        /// Knowledge type, e.g. injury_report or expert_article.
        #[arg(long = "type")]
        kind: KnowledgeType,

        content: String,

        #[arg(long)]
        source: Option<String>,

        /// Player the document is about; repeatable.
        #[arg(long = "player")]
        players: Vec<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Search knowledge and print the rendered context block.
    Search {
        query: String,

        /// start_sit, waiver, trade, matchup, injury or general.
        #[arg(long)]
        context: Option<ContextType>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    (!items.is_empty()).then_some(items)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Refresh => {
            let app = App::from_config(&cfg).await?;
            let snapshot = app.cache.force_refresh().await?;
            println!(
                "Refreshed {} players, {} trending ({} season, week {}).",
                snapshot.players.len(),
                snapshot.trending.len(),
                snapshot.season,
                snapshot.week
            );
        }
        Commands::Status => {
            let app = App::from_config(&cfg).await?;
            app.cache.restore().await;
            match app.cache.status() {
                Some(s) => {
                    println!("Season:          {} (week {})", s.season, s.week);
                    println!("Players loaded:  {}", s.players_loaded);
                    println!("Trending:        {}", s.trending_players);
                    println!("Last updated:    {}", s.last_updated.to_rfc3339());
                    println!(
                        "Fresh:           {} ({}s old)",
                        if s.fresh { "yes" } else { "no" },
                        s.age_seconds
                    );
                }
                None => println!("No player data cached yet. Run `ppr refresh`."),
            }
            println!("Knowledge docs:  {}", app.knowledge.count().await?);
        }
        Commands::Players {
            query,
            position,
            limit,
        } => {
            let app = App::from_config(&cfg).await?;
            let players = app
                .cache
                .search_players(&query, position.as_deref(), limit)
                .await?;
            if players.is_empty() {
                println!("No players found.");
            }
            for p in players {
                println!(
                    "{:<10} {:<28} {:<4} {:<4} {}",
                    p.player_id,
                    p.display_name(),
                    p.position.as_deref().unwrap_or("-"),
                    p.team_or_fa(),
                    p.status.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Knowledge { action } => {
            let app = App::from_config(&cfg).await?;
            match action {
                KnowledgeAction::Init => {
                    let added = ingest::initialize_knowledge_base(&app.knowledge).await?;
                    println!("Added {} knowledge documents.", added);
                }
                KnowledgeAction::IngestDaily => {
                    let weather = WeatherClient::from_env()?;
                    let report = ingest::run_daily_ingestion(&app.knowledge, weather.as_ref()).await;
                    println!("Weather alerts:   {}", report.weather_alerts);
                    println!("Injury reports:   {}", report.injury_reports);
                    println!("Expert insights:  {}", report.expert_insights);
                    for failure in &report.failures {
                        println!("  failed: {}", failure);
                    }
                }
                KnowledgeAction::Add {
                    kind,
                    content,
                    source,
                    players,
                    tags,
                } => {
                    let id = app
                        .knowledge
                        .add(NewKnowledge {
                            kind,
                            content,
                            metadata: KnowledgeMetadata {
                                player_names: non_empty(players),
                                tags: non_empty(tags),
                                source,
                                ..Default::default()
                            },
                        })
                        .await?;
                    println!("{}", id);
                }
                KnowledgeAction::Search {
                    query,
                    context,
                    limit,
                } => {
                    let max = limit.unwrap_or(cfg.knowledge.default_max_results);
                    let mut q = KnowledgeQuery::new(query, max);
                    if let Some(ct) = context {
                        q = q.context(ct);
                    }
                    let results = app.knowledge.search(&q).await?;
                    for r in &results {
                        println!("[{}] {} ({})", r.score, r.document.id, r.document.kind);
                    }
                    println!("{}", render_context(&results));
                }
            }
        }
        Commands::Upload {
            path,
            title,
            source,
            doc_type,
            tags,
        } => {
            let app = App::from_config(&cfg).await?;
            let opts = UploadOptions {
                title,
                source,
                document_type: doc_type,
                tags,
                chunk_size: cfg.knowledge.chunk_size,
            };
            let summaries = ingest::upload_path(&app.knowledge, &path, &opts).await?;
            let chunks: usize = summaries.iter().map(|s| s.chunks_created).sum();
            for s in &summaries {
                println!("{}: {} chunks", s.title, s.chunks_created);
            }
            println!("Uploaded {} documents ({} chunks).", summaries.len(), chunks);
        }
        Commands::Chat { message } => {
            let app = App::from_config(&cfg).await?;
            let resp = app.chat.handle(ChatRequest::new(message)).await?;
            println!("{}", resp.message);
            println!();
            println!("Sources: {}", resp.sources.join(", "));
            if let Some(note) = resp.note {
                println!("Note: {}", note);
            }
        }
    }

    Ok(())
}
