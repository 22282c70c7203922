//! Read and refresh endpoints over the news store.
//!
//! Reads hit the store directly; pipeline runs go to the blocking pool so
//! request serving never waits on ingestion or enrichment.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::news_store::{Category, Item, Lean, Record};
use crate::pipeline::RunResult;
use crate::ranking::RankedRecord;
use crate::server::state::{GuardedNewsStore, ServerState};

/// Upper bound for the `limit` query parameter.
const MAX_PAGE_SIZE: usize = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

/// `force` is taken as a raw string so that any value yields a structured
/// response; only a case-insensitive "true" forces ingestion.
#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub force: Option<String>,
}

impl RefreshQuery {
    pub fn force(&self) -> bool {
        self.force
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub articles: usize,
    pub stories: usize,
    pub run: RunResult,
}

#[derive(Debug, Deserialize)]
pub struct StoriesQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceView {
    pub name: String,
    pub lean: Lean,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<Item> for SourceView {
    fn from(item: Item) -> Self {
        SourceView {
            name: item.source_name,
            lean: item.lean,
            title: item.title,
            url: item.url,
            published_at: item.published_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoryView {
    #[serde(flatten)]
    pub record: Record,
    pub sources: Vec<SourceView>,
    pub relevance_score: u32,
}

impl From<RankedRecord> for StoryView {
    fn from(ranked: RankedRecord) -> Self {
        StoryView {
            record: ranked.record,
            sources: ranked.items.into_iter().map(SourceView::from).collect(),
            relevance_score: ranked.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoriesResponse {
    pub stories: Vec<StoryView>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn refresh(State(state): State<ServerState>, Query(query): Query<RefreshQuery>) -> Response {
    let force = query.force();
    info!(force, "Manual refresh requested");
    let coordinator = state.coordinator.clone();
    let run = match tokio::task::spawn_blocking(move || coordinator.run_pipeline(force)).await
    {
        Ok(run) => run,
        Err(e) => {
            error!("Refresh task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if !run.is_success() {
        let message = run.error.clone().unwrap_or_default();
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": message })),
        )
            .into_response();
    }

    match state.news_store.get_stats() {
        Ok(stats) => Json(RefreshResponse {
            status: "completed",
            articles: stats.total_items,
            stories: stats.total_records,
            run,
        })
        .into_response(),
        Err(e) => {
            error!("Failed to read stats after refresh: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn get_stats(State(store): State<GuardedNewsStore>) -> Response {
    match store.get_stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to read stats: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Loads the newest records, optionally filtered, with their items, ranked.
fn ranked_stories(state: &ServerState, category: Option<Category>) -> Result<Vec<RankedRecord>> {
    let records = state
        .news_store
        .list_records(state.listing.max_ranked_records, 0)?;
    let mut with_items = Vec::with_capacity(records.len());
    for record in records {
        if category.is_some() && record.category != category {
            continue;
        }
        let items = state.news_store.items_for_record(record.id)?;
        with_items.push((record, items));
    }
    Ok(state.ranker.rank(with_items))
}

async fn get_stories(
    State(state): State<ServerState>,
    Query(query): Query<StoriesQuery>,
) -> Response {
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => match raw.parse::<Category>() {
            Ok(category) => Some(category),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => None,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.listing.stories_per_page)
        .clamp(1, MAX_PAGE_SIZE);

    let ranked = match ranked_stories(&state, category) {
        Ok(ranked) => ranked,
        Err(e) => {
            error!("Failed to load stories: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };

    let total = ranked.len();
    let stories = ranked
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(StoryView::from)
        .collect();

    Json(StoriesResponse {
        stories,
        page,
        limit,
        total,
    })
    .into_response()
}

async fn get_story(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    let record = match state.news_store.get_record(id) {
        Ok(Some(record)) => record,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Story not found"),
        Err(e) => {
            error!("Failed to load story {}: {:#}", id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };
    match state.news_store.items_for_record(id) {
        Ok(items) => {
            let score = state.ranker.score(&record, &items);
            Json(StoryView::from(RankedRecord {
                record,
                items,
                score,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Failed to load sources of story {}: {:#}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn get_last_updated(State(store): State<GuardedNewsStore>) -> Response {
    match store.get_stats() {
        Ok(stats) => Json(json!({ "last_record_at": stats.last_record_at })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn health(State(store): State<GuardedNewsStore>) -> Response {
    match store.get_stats() {
        Ok(stats) => Json(json!({
            "status": "healthy",
            "articles": stats.total_items,
            "stories": stats.total_records,
        }))
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn news_routes() -> Router<ServerState> {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/stats", get(get_stats))
        .route("/stories", get(get_stories))
        .route("/story/{id}", get(get_story))
        .route("/last-updated", get(get_last_updated))
        .route("/health", get(health))
}
