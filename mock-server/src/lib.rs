use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const SECRET_HEADER: &str = "x-ingest-secret";
pub const DEFAULT_LIMIT: usize = 50;

/// Identity of the single board this server hosts.
#[derive(Clone, Debug)]
pub struct BoardConfig {
    pub secret: String,
    pub slug: String,
    pub public_id: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            secret: "test-secret".to_string(),
            slug: "demo".to_string(),
            public_id: "pub-demo".to_string(),
        }
    }
}

impl BoardConfig {
    /// Reads `FOUNDERWISH_SECRET` and `FOUNDERWISH_SLUG`, keeping defaults for
    /// unset variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(secret) = std::env::var("FOUNDERWISH_SECRET") {
            config.secret = secret;
        }
        if let Ok(slug) = std::env::var("FOUNDERWISH_SLUG") {
            config.public_id = format!("pub-{slug}");
            config.slug = slug;
        }
        config
    }

    fn hosts(&self, public_id: &str) -> bool {
        public_id == self.slug || public_id == self.public_id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub votes: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: String,
    pub category: String,
    pub user_identifier: String,
    /// Device and profile fields, stored as sent.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestInfo {
    pub slug: String,
    pub public_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemList {
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub public_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpvoteRequest {
    pub feedback_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpvoteResponse {
    pub ok: bool,
    pub votes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackCreated {
    pub ok: bool,
    pub id: String,
}

/// Per-endpoint request counts, including rejected requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub ingest_info: usize,
    pub feedback: usize,
    pub public_feedback: usize,
    pub upvote: usize,
}

#[derive(Default)]
struct Hits {
    ingest_info: AtomicUsize,
    feedback: AtomicUsize,
    public_feedback: AtomicUsize,
    upvote: AtomicUsize,
}

struct Board {
    config: BoardConfig,
    items: RwLock<Vec<Item>>,
    submissions: RwLock<Vec<FeedbackSubmission>>,
    hits: Hits,
}

/// Shared server state. Clones observe the same board.
#[derive(Clone)]
pub struct AppState {
    board: Arc<Board>,
}

impl AppState {
    pub fn new(config: BoardConfig, items: Vec<Item>) -> Self {
        Self {
            board: Arc::new(Board {
                config,
                items: RwLock::new(items),
                submissions: RwLock::new(Vec::new()),
                hits: Hits::default(),
            }),
        }
    }

    pub fn seeded(config: BoardConfig) -> Self {
        Self::new(config, seed_items())
    }

    pub fn config(&self) -> &BoardConfig {
        &self.board.config
    }

    pub fn counters(&self) -> Counters {
        let hits = &self.board.hits;
        Counters {
            ingest_info: hits.ingest_info.load(Ordering::SeqCst),
            feedback: hits.feedback.load(Ordering::SeqCst),
            public_feedback: hits.public_feedback.load(Ordering::SeqCst),
            upvote: hits.upvote.load(Ordering::SeqCst),
        }
    }

    pub async fn items(&self) -> Vec<Item> {
        self.board.items.read().await.clone()
    }

    pub async fn submissions(&self) -> Vec<FeedbackSubmission> {
        self.board.submissions.read().await.clone()
    }
}

/// Three public items in different states.
pub fn seed_items() -> Vec<Item> {
    let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).single().unwrap_or_default();
    vec![
        Item {
            id: "seed-1".to_string(),
            title: "Dark mode".to_string(),
            description: Some("Easier on the eyes at night".to_string()),
            status: "open".to_string(),
            source: Some("ios".to_string()),
            created_at: day(1),
            votes: 5,
        },
        Item {
            id: "seed-2".to_string(),
            title: "Home screen widget".to_string(),
            description: None,
            status: "planned".to_string(),
            source: Some("ios".to_string()),
            created_at: day(2),
            votes: 2,
        },
        Item {
            id: "seed-3".to_string(),
            title: "CSV export".to_string(),
            description: None,
            status: "closed".to_string(),
            source: None,
            created_at: day(3),
            votes: 0,
        },
    ]
}

type ApiError = (StatusCode, String);

pub fn app() -> Router {
    router(AppState::seeded(BoardConfig::default()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest-info", get(ingest_info))
        .route("/api/feedback", post(submit_feedback))
        .route("/api/public-feedback", get(list_public_feedback))
        .route("/api/public-upvote", post(upvote))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

fn check_secret(headers: &HeaderMap, config: &BoardConfig) -> Result<(), ApiError> {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if provided == Some(config.secret.as_str()) {
        Ok(())
    } else {
        debug!("Rejected request with missing or wrong ingest secret");
        Err((StatusCode::UNAUTHORIZED, "invalid ingest secret".to_string()))
    }
}

async fn ingest_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IngestInfo>, ApiError> {
    state.board.hits.ingest_info.fetch_add(1, Ordering::SeqCst);
    let config = state.config();
    check_secret(&headers, config)?;
    Ok(Json(IngestInfo {
        slug: config.slug.clone(),
        public_id: config.public_id.clone(),
    }))
}

async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<FeedbackSubmission>,
) -> Result<(StatusCode, Json<FeedbackCreated>), ApiError> {
    state.board.hits.feedback.fetch_add(1, Ordering::SeqCst);
    check_secret(&headers, state.config())?;
    if input.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title is required".to_string()));
    }

    let item = Item {
        id: Uuid::new_v4().to_string(),
        title: input.title.clone(),
        description: input.description.clone(),
        status: "open".to_string(),
        source: Some(input.source.clone()),
        created_at: Utc::now(),
        votes: 0,
    };
    let id = item.id.clone();
    info!(id = %id, category = %input.category, "Feedback received");

    state.board.items.write().await.push(item);
    state.board.submissions.write().await.push(input);
    Ok((StatusCode::CREATED, Json(FeedbackCreated { ok: true, id })))
}

async fn list_public_feedback(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ItemList>, ApiError> {
    state.board.hits.public_feedback.fetch_add(1, Ordering::SeqCst);
    let public_id = params
        .public_id
        .filter(|id| !id.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "public_id is required".to_string()))?;
    if !state.config().hosts(&public_id) {
        return Err((StatusCode::NOT_FOUND, "board not found".to_string()));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let items: Vec<Item> = state
        .board
        .items
        .read()
        .await
        .iter()
        .take(limit)
        .cloned()
        .collect();
    debug!(count = items.len(), limit, "Listing public feedback");
    Ok(Json(ItemList { items }))
}

async fn upvote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UpvoteRequest>,
) -> Result<Json<UpvoteResponse>, ApiError> {
    state.board.hits.upvote.fetch_add(1, Ordering::SeqCst);
    check_secret(&headers, state.config())?;

    let mut items = state.board.items.write().await;
    let item = items
        .iter_mut()
        .find(|item| item.id == input.feedback_id)
        .ok_or((StatusCode::NOT_FOUND, "feedback not found".to_string()))?;
    item.votes += 1;
    info!(id = %item.id, votes = item.votes, "Upvoted");
    Ok(Json(UpvoteResponse {
        ok: true,
        votes: item.votes,
    }))
}
