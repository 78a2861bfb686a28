use axum::{extract::{Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use wikisearch_core::tokenizer::tokenize;
use wikisearch_core::{Field, IndexError, SearchEngine, SearchHit};

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    /// Stem query tokens; must match how the indexes were built.
    pub stem: bool,
}

type ApiError = (StatusCode, String);

pub fn build_app(engine: Arc<SearchEngine>, stem: bool) -> Router {
    let app_state = AppState { engine, stem };

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
        .route("/search_body", get(search_body_handler))
        .route("/search_title", get(search_title_handler))
        .route("/search_anchor", get(search_anchor_handler))
        .route("/get_pagerank", post(page_rank_handler))
        .route("/get_pageview", post(page_view_handler))
        .with_state(app_state)
        .layer(cors)
}

fn error_response(err: IndexError) -> ApiError {
    let status = if err.is_retryable() { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::INTERNAL_SERVER_ERROR };
    tracing::warn!(error = %err, %status, "query failed");
    (status, err.to_string())
}

/// Tokenizes and runs the query off the async executor; block fetches are blocking I/O.
async fn run_query(state: AppState, query: String, field: Field) -> Result<Json<Vec<SearchHit>>, ApiError> {
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let start = std::time::Instant::now();
    let engine = Arc::clone(&state.engine);
    let hits = tokio::task::spawn_blocking(move || {
        let tokens = tokenize(&query, state.stem);
        engine.search_field(&tokens, field)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(error_response)?;
    tracing::info!(%field, hits = hits.len(), took_s = start.elapsed().as_secs_f64(), "search");
    Ok(Json(hits))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<SearchHit>>, ApiError> {
    run_query(state, params.query, Field::Fused).await
}

pub async fn search_body_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<SearchHit>>, ApiError> {
    run_query(state, params.query, Field::Body).await
}

pub async fn search_title_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<SearchHit>>, ApiError> {
    run_query(state, params.query, Field::Title).await
}

pub async fn search_anchor_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<SearchHit>>, ApiError> {
    run_query(state, params.query, Field::Anchor).await
}

/// Ids may arrive as numbers or strings; tables are keyed by the string form.
fn id_keys(ids: &[Value]) -> Vec<String> {
    ids.iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

pub async fn page_rank_handler(State(state): State<AppState>, Json(ids): Json<Vec<Value>>) -> Json<Vec<f64>> {
    Json(state.engine.page_rank(&id_keys(&ids)))
}

pub async fn page_view_handler(State(state): State<AppState>, Json(ids): Json<Vec<Value>>) -> Json<Vec<u64>> {
    Json(state.engine.page_views(&id_keys(&ids)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_map_to_service_unavailable() {
        let (status, _) = error_response(IndexError::Timeout { path: "body/body_index_000.bin".into() });
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = error_response(IndexError::io("x", std::io::Error::other("reset")));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, body) = error_response(IndexError::corruption("body_index_000.bin", "referenced block is missing"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("body_index_000.bin"));
    }
}
