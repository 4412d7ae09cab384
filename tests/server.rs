use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use ppr_expert::app::App;
use ppr_expert::config::Config;
use ppr_expert::llm::LanguageModel;
use ppr_expert::models::{LeagueState, Player, TrendingPlayer};
use ppr_expert::server;
use ppr_expert::sleeper::PlayerSource;

fn player(id: &str, name: &str, position: &str, team: &str, rank: i64) -> Player {
    let (first, last) = name.split_once(' ').unwrap();
    Player {
        player_id: id.into(),
        full_name: Some(name.into()),
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        position: Some(position.into()),
        team: Some(team.into()),
        status: Some("Active".into()),
        injury_status: None,
        injury_body_part: None,
        search_rank: Some(rank),
        fantasy_positions: Some(vec![position.into()]),
        years_exp: None,
        age: None,
        height: None,
        weight: None,
    }
}

struct FakeSource {
    down: AtomicBool,
}

#[async_trait]
impl PlayerSource for FakeSource {
    async fn fetch_players(&self) -> Result<HashMap<String, Player>> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("sleeper down");
        }
        Ok([
            player("6786", "Cooper Kupp", "WR", "LAR", 40),
            player("4034", "Christian McCaffrey", "RB", "SF", 2),
            player("4046", "Patrick Mahomes", "QB", "KC", 10),
            player("4881", "Travis Kelce", "TE", "KC", 30),
        ]
        .into_iter()
        .map(|p| (p.player_id.clone(), p))
        .collect())
    }

    async fn fetch_state(&self) -> Result<LeagueState> {
        Ok(LeagueState {
            season: "2024".into(),
            week: 8,
        })
    }

    async fn fetch_trending(&self) -> Result<Vec<TrendingPlayer>> {
        Ok(vec![TrendingPlayer {
            player_id: "6786".into(),
            count: 1200,
        }])
    }
}

struct FakeModel {
    answer: Option<&'static str>,
    last_prompt: Mutex<Option<String>>,
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn label(&self) -> &str {
        "Fake PPR Expert"
    }

    async fn generate(&self, prompt: &str, _season: &str) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match self.answer {
            Some(a) => Ok(a.to_string()),
            None => anyhow::bail!("model offline"),
        }
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    source: Arc<FakeSource>,
    model: Arc<FakeModel>,
    _tmp: TempDir,
}

async fn start(answer: Option<&'static str>) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("ppr.sqlite");

    let source = Arc::new(FakeSource {
        down: AtomicBool::new(false),
    });
    let model = Arc::new(FakeModel {
        answer,
        last_prompt: Mutex::new(None),
    });
    let app = App::with_source(&config, source.clone(), model.clone())
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        source,
        model,
        _tmp: tmp,
    }
}

impl TestServer {
    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let srv = start(None).await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_chat_success_uses_live_data_and_knowledge() {
    let srv = start(Some("Start Kupp, he sees 9 targets a game.")).await;
    srv.post("/knowledge", json!({"action": "initialize"})).await;

    let (status, body) = srv
        .post(
            "/chat",
            json!({"message": "Should I start Cooper Kupp this week?", "messages": []}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Start Kupp, he sees 9 targets a game.");
    assert_eq!(body["confidence"], 0.85);
    assert!(body.get("note").is_none());
    assert_eq!(body["sources"][0], "Fake PPR Expert");
    assert_eq!(body["sources"][1], "Sleeper API (2024 Season, Week 8)");
    assert_eq!(body["playersAnalyzed"][0]["name"], "Cooper Kupp");
    assert_eq!(body["contextData"]["contextType"], "start_sit");
    assert_eq!(body["contextData"]["playersScanned"], "Live data integrated");

    let prompt = srv.model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Cooper Kupp (WR, LAR, Status: Active)"));
    assert!(prompt.ends_with("User: Should I start Cooper Kupp this week?\n\nAssistant:"));
}

#[tokio::test]
async fn test_chat_falls_back_when_model_fails() {
    let srv = start(None).await;
    let (status, body) = srv
        .post("/chat", json!({"message": "Any waiver wire pickups?"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["confidence"], 0.5);
    assert_eq!(body["sources"][0], "PPR Fallback Expert (2024 Season Data)");
    assert_eq!(body["contextData"]["contextType"], "waiver");
    assert!(body["note"].as_str().unwrap().starts_with("Using fallback response"));
}

#[tokio::test]
async fn test_chat_rejects_blank_and_malformed_bodies() {
    let srv = start(None).await;

    let (status, body) = srv.post("/chat", json!({"message": "  "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "Message is required");

    let (status, body) = srv.post("/chat", json!({"message": 42})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_knowledge_actions() {
    let srv = start(None).await;

    let (status, body) = srv.post("/knowledge", json!({"action": "initialize"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["documentsAdded"], 5);

    let (status, body) = srv
        .post(
            "/knowledge",
            json!({
                "action": "add_knowledge",
                "type": "player_news",
                "content": "Cooper Kupp practiced in full on Wednesday",
                "metadata": {"player_names": ["Cooper Kupp"], "source": "Beat Writer"}
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["id"].as_str().unwrap().len(), 36);

    let (_, body) = srv.get("/knowledge").await;
    assert_eq!(body["documentCount"], 6);

    let (status, body) = srv
        .post(
            "/knowledge",
            json!({
                "action": "search",
                "query": "practiced",
                "context_type": "injury",
                "player_mentions": ["Cooper Kupp"]
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["results"][0]["type"], "player_news");
    assert!(body["context"]
        .as_str()
        .unwrap()
        .contains("PLAYER_NEWS: Cooper Kupp practiced in full on Wednesday (Source: Beat Writer)"));
    for r in body["results"].as_array().unwrap() {
        assert!(r["type"] == "player_news" || r["type"] == "injury_report");
    }
}

#[tokio::test]
async fn test_knowledge_search_caps_max_results() {
    let srv = start(None).await;
    srv.post("/knowledge", json!({"action": "initialize"})).await;

    let (status, body) = srv
        .post(
            "/knowledge",
            json!({"action": "search", "query": "targets", "max_results": u64::MAX}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 5);
}

#[tokio::test]
async fn test_knowledge_rejects_bad_actions() {
    let srv = start(None).await;

    let (status, body) = srv.post("/knowledge", json!({"action": "explode"})).await;
    assert_eq!(status, 400);
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Invalid action"));

    let (status, _) = srv
        .post("/knowledge", json!({"action": "add_knowledge", "type": "gossip", "content": "x"}))
        .await;
    assert_eq!(status, 400);

    let (status, _) = srv
        .post("/knowledge", json!({"action": "search", "query": "   "}))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_players_search_and_lookup() {
    let srv = start(None).await;

    let (status, body) = srv.get("/players?q=kupp").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["players"][0]["player_id"], "6786");

    let (_, body) = srv.get("/players?position=QB").await;
    assert_eq!(body["players"][0]["full_name"], "Patrick Mahomes");

    let (status, body) = srv
        .post("/players", json!({"playerIds": ["4034", "missing"]}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["players"][0]["full_name"], "Christian McCaffrey");

    let (status, body) = srv.post("/players", json!({"playerIds": "4034"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "playerIds must be an array");
}

#[tokio::test]
async fn test_players_unavailable_without_any_snapshot() {
    let srv = start(None).await;
    srv.source.down.store(true, Ordering::SeqCst);

    let (status, body) = srv.get("/players?q=kupp").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

#[tokio::test]
async fn test_refresh_reports_stats_and_status() {
    let srv = start(None).await;

    let (_, body) = srv.get("/refresh-data").await;
    assert!(body["status"].is_null());

    let (status, body) = srv.post("/refresh-data", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["stats"]["playersLoaded"], 4);
    assert_eq!(body["stats"]["trendingPlayers"], 1);

    let (_, body) = srv.get("/refresh-data").await;
    assert_eq!(body["status"]["season"], "2024");
    assert_eq!(body["status"]["fresh"], true);

    srv.source.down.store(true, Ordering::SeqCst);
    let (status, _) = srv.post("/refresh-data", json!({})).await;
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_upload_document() {
    let srv = start(None).await;

    let (status, body) = srv.get("/upload-document").await;
    assert_eq!(status, 200);
    assert_eq!(body["defaultChunkSize"], 1000);

    let content = format!("{}\n\n{}", "a".repeat(600), "b".repeat(600));
    let (status, body) = srv
        .post(
            "/upload-document",
            json!({"title": "Week 9 Primer", "content": content, "tags": ["primer"]}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["chunksCreated"], 2);
    assert_eq!(body["ids"].as_array().unwrap().len(), 2);

    let (status, _) = srv
        .post("/upload-document", json!({"title": "", "content": "x"}))
        .await;
    assert_eq!(status, 400);

    let (status, _) = srv
        .post(
            "/upload-document",
            json!({"title": "t", "content": "x", "chunkSize": 0}),
        )
        .await;
    assert_eq!(status, 400);
}
