use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use pagesearch_core::{DocId, QueryEngine, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { DEFAULT_TOP_K }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub url: String,
    pub title: Option<String>,
    pub score: f64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
}

/// Load the index once and build the router around a shared read-only engine.
pub fn build_app(index_dir: String) -> Result<Router> {
    let engine = QueryEngine::open(&index_dir)?;
    Ok(router(engine))
}

pub fn router(engine: QueryEngine) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(AppState { engine })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let page = state.engine.search_page(&params.q, k);
    let total_hits = page.total_hits;
    let results: Vec<SearchResult> = page
        .hits
        .into_iter()
        .map(|h| SearchResult { doc_id: h.doc_id, url: h.url, title: h.title, score: h.score })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, k, hits = results.len(), "search");
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> (StatusCode, Json<serde_json::Value>) {
    match state.engine.index().doc(doc_id) {
        Some(doc) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "doc_id": doc_id,
                "url": doc.url,
                "title": doc.title,
                "length": doc.length,
            })),
        ),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))),
    }
}
