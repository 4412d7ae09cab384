//! Knowledge ingestion: seed data, daily ingestion and file uploads.
//!
//! | Entry point | Writes |
//! |-------------|--------|
//! | [`initialize_knowledge_base`] | five baseline PPR strategy documents |
//! | [`run_daily_ingestion`] | weather alerts, injury updates, expert analysis |
//! | [`upload_path`] | chunked `.md` / `.txt` files from disk |
//!
//! Daily ingestion runs its three parts concurrently. A part that fails is
//! logged and counted in the report; it never aborts the others.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::{ingest_document, UploadRequest, UploadSummary};
use crate::knowledge::KnowledgeBase;
use crate::models::{KnowledgeMetadata, KnowledgeType, NewKnowledge};

const SEASON: &str = "2024";

fn seed(kind: KnowledgeType, content: &str, tags: &[&str], source: &str, confidence: f64) -> NewKnowledge {
    NewKnowledge {
        kind,
        content: content.to_string(),
        metadata: KnowledgeMetadata {
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            season: Some(SEASON.to_string()),
            source: Some(source.to_string()),
            confidence: Some(confidence),
            ..Default::default()
        },
    }
}

/// Baseline documents written by `initialize`.
pub fn seed_documents() -> Vec<NewKnowledge> {
    vec![
        seed(
            KnowledgeType::ExpertArticle,
            "PPR leagues heavily favor slot receivers and pass-catching running backs. Target share is the most predictive stat for PPR success. Players with 15%+ target share should be prioritized in all PPR formats.",
            &["PPR", "target_share", "slot_receivers", "pass_catching_RBs"],
            "Fantasy Football Analytics",
            0.9,
        ),
        seed(
            KnowledgeType::AdvancedStats,
            "Red zone targets are 3x more valuable in PPR than standard leagues due to high completion rates inside the 20-yard line. Look for players with 20+ red zone targets for consistent PPR production.",
            &["red_zone", "targets", "PPR_strategy"],
            "Advanced Fantasy Metrics",
            0.85,
        ),
        seed(
            KnowledgeType::MatchupAnalysis,
            "Teams trailing by 10+ points throw 25% more passes in the second half. Monitor game scripts for increased target opportunities, especially for slot receivers and pass-catching backs.",
            &["game_script", "targets", "trailing_teams"],
            "Game Script Analytics",
            0.8,
        ),
        seed(
            KnowledgeType::InjuryReport,
            "Players returning from hamstring injuries show 15-20% decreased target share in their first game back. Consider this when making start/sit decisions for recently injured players.",
            &["injuries", "hamstring", "target_share", "return"],
            "Injury Impact Analysis",
            0.75,
        ),
        seed(
            KnowledgeType::Weather,
            "Games with 15+ mph winds reduce passing attempts by 12% on average. This significantly impacts PPR scoring for WRs and pass-catching RBs. Monitor weather reports before lineup decisions.",
            &["weather", "wind", "passing_attempts", "PPR_impact"],
            "Weather Impact Study",
            0.85,
        ),
    ]
}

/// Write the baseline documents. Returns how many were stored.
pub async fn initialize_knowledge_base(kb: &KnowledgeBase) -> Result<usize> {
    let docs = seed_documents();
    let total = docs.len();
    for doc in docs {
        kb.add(doc).await?;
    }
    info!(documents = total, "knowledge base initialized");
    Ok(total)
}

struct InjuryNote {
    player: &'static str,
    team: &'static str,
    position: &'static str,
    injury: &'static str,
    status: &'static str,
    analysis: &'static str,
}

const INJURY_NOTES: &[InjuryNote] = &[
    InjuryNote {
        player: "Travis Kelce",
        team: "KC",
        position: "TE",
        injury: "ankle",
        status: "questionable",
        analysis: "Ankle injury may limit route running. Monitor snap count and target share if he plays.",
    },
    InjuryNote {
        player: "Stefon Diggs",
        team: "HOU",
        position: "WR",
        injury: "hamstring",
        status: "probable",
        analysis: "Hamstring injuries typically reduce target share by 15-20% in first game back. Consider backup options in PPR leagues.",
    },
];

fn injury_document(note: &InjuryNote) -> NewKnowledge {
    NewKnowledge {
        kind: KnowledgeType::InjuryReport,
        content: format!(
            "INJURY UPDATE: {} ({} {}) - {} with {} injury. PPR Impact: {}",
            note.player,
            note.team,
            note.position,
            note.status.to_uppercase(),
            note.injury,
            note.analysis
        ),
        metadata: KnowledgeMetadata {
            player_names: Some(vec![note.player.to_string()]),
            teams: Some(vec![note.team.to_string()]),
            position: Some(note.position.to_string()),
            tags: Some(vec![
                "injury".to_string(),
                note.injury.to_string(),
                note.status.to_string(),
                note.position.to_string(),
            ]),
            season: Some(SEASON.to_string()),
            source: Some("NFL Injury Reports".to_string()),
            confidence: Some(0.85),
            ..Default::default()
        },
    }
}

fn expert_documents() -> Vec<NewKnowledge> {
    const SOURCE: &str = "Fantasy Football God Expert Analysis";
    vec![
        seed(
            KnowledgeType::ExpertArticle,
            "Week 15 PPR Sleepers: Target players on teams that will be trailing early. Game script heavily favors pass-catching backs and slot receivers when teams are down by 10+ points.",
            &["week15", "sleepers", "game_script", "trailing_teams"],
            SOURCE,
            0.9,
        ),
        seed(
            KnowledgeType::ExpertArticle,
            "Championship Week Strategy: Prioritize players with safe floors over boom/bust options. In PPR, consistent target share (8+ targets/game) is more valuable than big-play potential.",
            &["championship", "strategy", "target_share", "consistency"],
            SOURCE,
            0.9,
        ),
        seed(
            KnowledgeType::AdvancedStats,
            "Red Zone Efficiency Alert: Teams with poor red zone rushing attacks rely more heavily on passing TDs. Target WRs and TEs from teams with bottom-10 rushing red zone efficiency.",
            &["red_zone", "efficiency", "passing_TDs", "WR_TE_targets"],
            SOURCE,
            0.9,
        ),
    ]
}

/// An NFL stadium checked for weather alerts.
#[derive(Debug, Clone, Copy)]
pub struct Stadium {
    pub city: &'static str,
    pub team: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const STADIUMS: &[Stadium] = &[
    Stadium { city: "Kansas City", team: "KC", lat: 39.0489, lon: -94.4839 },
    Stadium { city: "Buffalo", team: "BUF", lat: 42.7738, lon: -78.7865 },
    Stadium { city: "Miami", team: "MIA", lat: 25.958, lon: -80.2389 },
    Stadium { city: "Green Bay", team: "GB", lat: 44.5013, lon: -88.0622 },
];

/// The two fields of an OpenWeather current-weather response we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherReport {
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

/// Wind over 15 mph, rain or snow produce an alert; anything else is `None`.
pub fn weather_alert(stadium: &Stadium, report: &WeatherReport) -> Option<NewKnowledge> {
    let wind = report.wind.as_ref().map(|w| w.speed).unwrap_or(0.0);
    let conditions = report
        .weather
        .first()
        .map(|c| c.description.as_str())
        .filter(|d| !d.is_empty())
        .unwrap_or("clear");

    if wind <= 15.0 && !conditions.contains("rain") && !conditions.contains("snow") {
        return None;
    }

    Some(NewKnowledge {
        kind: KnowledgeType::Weather,
        content: format!(
            "Weather Alert for {} ({}): {} with {} mph winds. This may impact passing games and PPR production.",
            stadium.city,
            stadium.team,
            conditions,
            wind.round() as i64
        ),
        metadata: KnowledgeMetadata {
            teams: Some(vec![stadium.team.to_string()]),
            tags: Some(vec![
                "weather".to_string(),
                "wind".to_string(),
                stadium.team.to_string(),
                conditions.to_string(),
            ]),
            season: Some(SEASON.to_string()),
            source: Some("OpenWeather API".to_string()),
            confidence: Some(0.9),
            ..Default::default()
        },
    })
}

/// OpenWeather current-weather client. Only built when a key is configured.
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WeatherClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
        })
    }

    /// `None` when `OPENWEATHER_API_KEY` is unset or empty.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("OPENWEATHER_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(key)?)),
            _ => Ok(None),
        }
    }

    pub async fn current(&self, stadium: &Stadium) -> Result<WeatherReport> {
        let url = format!("{}/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", stadium.lat.to_string()),
                ("lon", stadium.lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "imperial".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("OpenWeather error {} for {}", status, stadium.city);
        }
        Ok(response.json().await?)
    }
}

async fn ingest_weather(kb: &KnowledgeBase, client: Option<&WeatherClient>) -> Result<usize> {
    let Some(client) = client else {
        warn!("OPENWEATHER_API_KEY not set, skipping weather ingestion");
        return Ok(0);
    };
    let mut added = 0;
    for stadium in STADIUMS {
        let report = match client.current(stadium).await {
            Ok(r) => r,
            Err(e) => {
                warn!(city = stadium.city, error = %e, "weather fetch failed");
                continue;
            }
        };
        if let Some(doc) = weather_alert(stadium, &report) {
            kb.add(doc).await?;
            added += 1;
        }
    }
    Ok(added)
}

async fn ingest_injuries(kb: &KnowledgeBase) -> Result<usize> {
    for note in INJURY_NOTES {
        kb.add(injury_document(note)).await?;
    }
    Ok(INJURY_NOTES.len())
}

async fn ingest_expert_analysis(kb: &KnowledgeBase) -> Result<usize> {
    let docs = expert_documents();
    let total = docs.len();
    for doc in docs {
        kb.add(doc).await?;
    }
    Ok(total)
}

/// Per-part document counts from one daily ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub weather_alerts: usize,
    pub injury_reports: usize,
    pub expert_insights: usize,
    pub failures: Vec<String>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.weather_alerts + self.injury_reports + self.expert_insights
    }
}

fn settle(part: &str, result: Result<usize>, failures: &mut Vec<String>) -> usize {
    match result {
        Ok(n) => n,
        Err(e) => {
            warn!(part, error = %e, "ingestion part failed");
            failures.push(format!("{}: {}", part, e));
            0
        }
    }
}

pub async fn run_daily_ingestion(kb: &KnowledgeBase, weather: Option<&WeatherClient>) -> IngestReport {
    info!("starting daily knowledge ingestion");
    let (w, i, e) = tokio::join!(
        ingest_weather(kb, weather),
        ingest_injuries(kb),
        ingest_expert_analysis(kb)
    );

    let mut failures = Vec::new();
    let report = IngestReport {
        weather_alerts: settle("weather", w, &mut failures),
        injury_reports: settle("injuries", i, &mut failures),
        expert_insights: settle("expert_analysis", e, &mut failures),
        failures,
    };

    info!(
        documents = report.total(),
        failures = report.failures.len(),
        "daily knowledge ingestion finished"
    );
    report
}

/// Options for [`upload_path`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Only honoured when `path` is a single file.
    pub title: Option<String>,
    pub source: Option<String>,
    pub document_type: Option<KnowledgeType>,
    pub tags: Vec<String>,
    pub chunk_size: usize,
}

fn is_text_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("txt")
    )
}

/// Chunk a file, or every `.md` / `.txt` file under a directory, into the
/// knowledge base. Files are processed in path order.
pub async fn upload_path(kb: &KnowledgeBase, path: &Path, opts: &UploadOptions) -> Result<Vec<UploadSummary>> {
    if !path.exists() {
        bail!("path does not exist: {}", path.display());
    }

    let files: Vec<std::path::PathBuf> = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file() && is_text_document(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        found
    };

    let single = path.is_file();
    let mut summaries = Vec::with_capacity(files.len());
    for file in files {
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        if content.trim().is_empty() {
            warn!(file = %file.display(), "skipping empty document");
            continue;
        }
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        let title = match (&opts.title, single) {
            (Some(t), true) => t.clone(),
            _ => stem,
        };

        let req = UploadRequest {
            title,
            content,
            source: opts.source.clone(),
            document_type: opts.document_type,
            tags: opts.tags.clone(),
            chunk_size: None,
        };
        summaries.push(ingest_document(kb, req, opts.chunk_size).await?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::knowledge::KnowledgeQuery;
    use crate::models::ContextType;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    fn report(speed: f64, description: &str) -> WeatherReport {
        WeatherReport {
            wind: Some(Wind { speed }),
            weather: vec![Condition {
                description: description.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_initialize_writes_five_documents() {
        let kb = kb();
        assert_eq!(initialize_knowledge_base(&kb).await.unwrap(), 5);
        assert_eq!(kb.count().await.unwrap(), 5);

        let hits = kb
            .search(&KnowledgeQuery::new("slot receivers", 5))
            .await
            .unwrap();
        assert_eq!(
            hits[0].document.metadata.source.as_deref(),
            Some("Fantasy Football Analytics")
        );
    }

    #[test]
    fn test_weather_alert_thresholds() {
        let gb = &STADIUMS[3];
        assert!(weather_alert(gb, &report(15.0, "clear sky")).is_none());
        assert!(weather_alert(gb, &report(3.0, "light snow")).is_some());

        let alert = weather_alert(gb, &report(21.6, "broken clouds")).unwrap();
        assert_eq!(
            alert.content,
            "Weather Alert for Green Bay (GB): broken clouds with 22 mph winds. This may impact passing games and PPR production."
        );
        assert_eq!(alert.metadata.teams, Some(vec!["GB".to_string()]));
    }

    #[test]
    fn test_weather_report_tolerates_missing_fields() {
        let r: WeatherReport = serde_json::from_str(r#"{"name":"Miami"}"#).unwrap();
        assert!(weather_alert(&STADIUMS[2], &r).is_none());
    }

    #[tokio::test]
    async fn test_daily_ingestion_without_weather_key() {
        let kb = kb();
        let report = run_daily_ingestion(&kb, None).await;
        assert_eq!(report.weather_alerts, 0);
        assert_eq!(report.injury_reports, 2);
        assert_eq!(report.expert_insights, 3);
        assert!(report.failures.is_empty());

        let injuries = kb
            .search(&KnowledgeQuery::new("", 10).context(ContextType::Injury))
            .await
            .unwrap();
        assert!(injuries
            .iter()
            .any(|r| r.document.content.starts_with("INJURY UPDATE: Travis Kelce (KC TE) - QUESTIONABLE")));
    }

    #[tokio::test]
    async fn test_upload_directory_picks_text_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.md"), "Handcuffs matter.").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "Stack your bench.").unwrap();
        std::fs::write(tmp.path().join("c.pdf"), "binary").unwrap();

        let kb = kb();
        let opts = UploadOptions {
            title: Some("ignored for directories".into()),
            chunk_size: 1000,
            ..Default::default()
        };
        let summaries = upload_path(&kb, tmp.path(), &opts).await.unwrap();
        let titles: Vec<&str> = summaries.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(kb.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upload_missing_path_fails() {
        let tmp = TempDir::new().unwrap();
        let err = upload_path(&kb(), &tmp.path().join("nope"), &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
