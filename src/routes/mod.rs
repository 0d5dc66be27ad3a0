//! API route handlers.

pub mod auth;

use crate::auth::middleware::AppState;
use crate::error::AppError;
use crate::middleware::security_headers;
use axum::{routing::get, routing::post, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// GET /health — Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Auth endpoints
        .route("/auth/nonce", post(auth::issue_nonce))
        .route("/auth/verify", post(auth::verify))
        .route(
            "/auth/session",
            get(auth::get_session)
                .post(auth::create_session)
                .delete(auth::delete_session),
        )
        .fallback(not_found)
}

/// The API router with body limit, CORS, request tracing and security
/// headers applied.
///
/// `CorsLayer::new()` allows no origins: the mini-app is served from the
/// same origin as the API.
pub fn app(state: AppState) -> Router {
    api_router()
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_body_bytes,
        ))
        .layer(CorsLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            security_headers,
        ))
        .with_state(state)
}
