//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | One chat turn |
//! | `GET`  | `/knowledge` | Knowledge features, actions and document count |
//! | `POST` | `/knowledge` | `initialize`, `ingest_daily`, `add_knowledge`, `search` |
//! | `GET`  | `/refresh-data` | Cache status (never fetches) |
//! | `POST` | `/refresh-data` | Force a player data refresh |
//! | `GET`  | `/players` | Search (`q`) or list cached players |
//! | `POST` | `/players` | Look players up by id |
//! | `GET`  | `/upload-document` | Upload endpoint description |
//! | `POST` | `/upload-document` | Chunk and store a document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Message is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_unavailable` (503),
//! `storage_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::App;
use crate::chat::{ChatError, ChatRequest, ChatResponse};
use crate::chunk::{ingest_document, UploadRequest};
use crate::config::Config;
use crate::ingest::{initialize_knowledge_base, run_daily_ingestion, WeatherClient};
use crate::knowledge::{render_context, KnowledgeQuery};
use crate::models::{ContextType, KnowledgeMetadata, KnowledgeType, NewKnowledge, Player};

/// Upper bound on `max_results` for knowledge search requests.
pub const MAX_SEARCH_RESULTS: usize = 50;

/// Starts the HTTP server on `[server].bind` with production wiring.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::from_config(config).await?;
    if app.cache.restore().await {
        info!("restored persisted player snapshot");
    }
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "PPR Expert listening");
    println!("PPR Expert listening on http://{}", config.server.bind);
    serve(listener, app).await
}

/// Serve `app` on an already-bound listener until the process exits.
pub async fn serve(listener: tokio::net::TcpListener, app: App) -> anyhow::Result<()> {
    axum::serve(listener, build_router(app)).await?;
    Ok(())
}

pub fn build_router(app: App) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/knowledge", get(handle_knowledge_info).post(handle_knowledge_action))
        .route("/refresh-data", get(handle_cache_status).post(handle_refresh))
        .route("/players", get(handle_players_search).post(handle_players_lookup))
        .route("/upload-document", get(handle_upload_info).post(handle_upload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn upstream_unavailable(err: anyhow::Error) -> AppError {
    error!(error = %err, "player data unavailable");
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "upstream_unavailable".to_string(),
        message: format!("Player data unavailable: {}", err),
    }
}

fn storage_error(err: anyhow::Error) -> AppError {
    error!(error = %err, "storage failure");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage_error".to_string(),
        message: err.to_string(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Accept any JSON body, then decode it so malformed input gets the JSON
/// error shape instead of axum's plain-text rejection.
fn decode<T: DeserializeOwned>(payload: Result<Json<Value>, JsonRejection>) -> Result<T, AppError> {
    let Json(value) = payload.map_err(|e| bad_request(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| bad_request(format!("invalid request body: {}", e)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

async fn handle_chat(
    State(app): State<App>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let req: ChatRequest = decode(payload)?;
    match app.chat.handle(req).await {
        Ok(resp) => Ok(Json(resp)),
        Err(e @ ChatError::EmptyMessage) => Err(bad_request(e.to_string())),
    }
}

// ============ /knowledge ============

async fn handle_knowledge_info(State(app): State<App>) -> Result<Json<Value>, AppError> {
    let count = app.knowledge.count().await.map_err(storage_error)?;
    Ok(Json(json!({
        "success": true,
        "message": "PPR knowledge base",
        "documentCount": count,
        "features": [
            "Keyword relevance scoring with recency boost",
            "Context-aware filtering by question type",
            "Player mention boosting",
            "Daily injury, weather and expert ingestion",
        ],
        "endpoints": {
            "initialize": "POST /knowledge { \"action\": \"initialize\" }",
            "ingest_daily": "POST /knowledge { \"action\": \"ingest_daily\" }",
            "add_knowledge": "POST /knowledge { \"action\": \"add_knowledge\", \"type\": \"injury_report\", \"content\": \"...\", \"metadata\": {} }",
            "search": "POST /knowledge { \"action\": \"search\", \"query\": \"...\", \"context_type\": \"injury\", \"max_results\": 5 }",
        },
        "types": KnowledgeType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct KnowledgeAction {
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<KnowledgeMetadata>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    context_type: Option<String>,
    #[serde(default)]
    player_mentions: Vec<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

async fn handle_knowledge_action(
    State(app): State<App>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body: KnowledgeAction = decode(payload)?;

    match body.action.as_deref() {
        Some("initialize") => {
            let added = initialize_knowledge_base(&app.knowledge)
                .await
                .map_err(storage_error)?;
            Ok(Json(json!({
                "success": true,
                "message": "Knowledge base initialized with PPR strategy documents",
                "documentsAdded": added,
            })))
        }
        Some("ingest_daily") => {
            let weather = WeatherClient::from_env().map_err(|e| internal(e.to_string()))?;
            let report = run_daily_ingestion(&app.knowledge, weather.as_ref()).await;
            Ok(Json(json!({
                "success": report.failures.is_empty(),
                "message": "Daily ingestion finished",
                "report": report,
            })))
        }
        Some("add_knowledge") => {
            let (kind, content) = match (body.kind, body.content) {
                (Some(k), Some(c)) if !c.trim().is_empty() => (k, c),
                _ => return Err(bad_request("type and content are required")),
            };
            let kind: KnowledgeType = kind.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
            let id = app
                .knowledge
                .add(NewKnowledge {
                    kind,
                    content,
                    metadata: body.metadata.unwrap_or_default(),
                })
                .await
                .map_err(storage_error)?;
            Ok(Json(json!({ "success": true, "id": id })))
        }
        Some("search") => {
            let query = body
                .query
                .filter(|q| !q.trim().is_empty())
                .ok_or_else(|| bad_request("query is required"))?;
            let max = body
                .max_results
                .unwrap_or(app.config.knowledge.default_max_results)
                .min(MAX_SEARCH_RESULTS);
            let mut q = KnowledgeQuery::new(query, max).mentions(body.player_mentions);
            // Unknown context types search unfiltered.
            if let Some(ct) = body.context_type.and_then(|c| c.parse::<ContextType>().ok()) {
                q = q.context(ct);
            }
            let results = app.knowledge.search(&q).await.map_err(storage_error)?;
            Ok(Json(json!({
                "success": true,
                "count": results.len(),
                "context": render_context(&results),
                "results": results,
            })))
        }
        _ => Err(bad_request(
            "Invalid action. Use initialize, ingest_daily, add_knowledge, or search",
        )),
    }
}

// ============ /refresh-data ============

async fn handle_cache_status(State(app): State<App>) -> Result<Json<Value>, AppError> {
    let documents = app.knowledge.count().await.map_err(storage_error)?;
    let body = match app.cache.status() {
        Some(status) => json!({
            "success": true,
            "status": status,
            "knowledgeDocuments": documents,
        }),
        None => json!({
            "success": true,
            "status": Value::Null,
            "message": "No player data cached yet",
            "knowledgeDocuments": documents,
        }),
    };
    Ok(Json(body))
}

async fn handle_refresh(State(app): State<App>) -> Result<Json<Value>, AppError> {
    app.cache.force_refresh().await.map_err(upstream_unavailable)?;
    let stats = app
        .cache
        .status()
        .ok_or_else(|| internal("snapshot missing after refresh"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Player data refreshed",
        "stats": stats,
    })))
}

// ============ /players ============

#[derive(Deserialize)]
struct PlayersQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

fn players_body(players: Vec<Player>) -> Json<Value> {
    Json(json!({
        "success": true,
        "count": players.len(),
        "players": players,
    }))
}

async fn handle_players_search(
    State(app): State<App>,
    Query(params): Query<PlayersQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.unwrap_or(20);
    let position = params.position.as_deref().filter(|p| !p.is_empty());
    let players = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => app.cache.search_players(q, position, limit).await,
        None => app.cache.list_players(position, limit).await,
    }
    .map_err(upstream_unavailable)?;
    Ok(players_body(players))
}

async fn handle_players_lookup(
    State(app): State<App>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body: Value = decode(payload)?;
    let ids: Vec<String> = match body.get("playerIds") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => return Err(bad_request("playerIds must be an array")),
    };
    let players = app
        .cache
        .players_by_ids(&ids)
        .await
        .map_err(upstream_unavailable)?;
    Ok(players_body(players))
}

// ============ /upload-document ============

async fn handle_upload_info(State(app): State<App>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Document upload endpoint ready",
        "endpoints": {
            "upload_document": "POST /upload-document { \"title\": \"...\", \"content\": \"...\", \"source\": \"...\", \"documentType\": \"expert_article\", \"tags\": [\"tag1\"], \"chunkSize\": 1000 }",
        },
        "defaultChunkSize": app.config.knowledge.chunk_size,
        "supported_types": KnowledgeType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    }))
}

async fn handle_upload(
    State(app): State<App>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let req: UploadRequest = decode(payload)?;
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(bad_request("title and content are required"));
    }
    if req.chunk_size == Some(0) {
        return Err(bad_request("chunkSize must be greater than 0"));
    }

    let summary = ingest_document(&app.knowledge, req, app.config.knowledge.chunk_size)
        .await
        .map_err(storage_error)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Document \"{}\" uploaded and processed successfully!", summary.title),
        "chunksCreated": summary.chunks_created,
        "ids": summary.ids,
    })))
}
