//! Auth API endpoints.

use crate::auth::middleware::{AppState, AuthSession};
use crate::auth::verify::{verify_signed_message, VerifyError};
use crate::error::{AppError, VerifyRejection};
use crate::models::{
    CreateSessionRequest, CreateSessionResponse, NonceResponse, SessionStatus, VerifyRequest,
    VerifyResponse,
};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

/// Count an auth request against the per-IP limit.
fn enforce_auth_rate_limit(
    state: &AppState,
    addr: &SocketAddr,
    endpoint: &'static str,
) -> Result<(), AppError> {
    if state.auth_limiter.check_key(&addr.ip()).is_ok() {
        return Ok(());
    }

    let mut hasher = std::hash::DefaultHasher::new();
    addr.ip().hash(&mut hasher);
    let ip_hash = format!("{:x}", hasher.finish());
    tracing::warn!(action = "rate_limited", endpoint, ip_hash = %ip_hash, "Rate limit exceeded");
    Err(AppError::RateLimited)
}

/// POST /auth/nonce — Issue a sign-in nonce
pub async fn issue_nonce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, &addr, "auth/nonce")?;

    let nonce = state.nonces.issue(Utc::now());

    tracing::debug!(action = "nonce_issued", outstanding = state.nonces.len(), "Nonce issued");

    Ok(Json(NonceResponse { nonce }))
}

/// POST /auth/verify — Verify a signed sign-in message
pub async fn verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VerifyRejection> {
    enforce_auth_rate_limit(&state, &addr, "auth/verify")?;

    let Json(req) = body.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let now = Utc::now();
    let wallet = verify_signed_message(&state.nonces, &req, now).map_err(|e| match e {
        VerifyError::Malformed(msg) => AppError::BadRequest(msg),
        VerifyError::Rejected(msg) => {
            tracing::warn!(action = "verify_failed", reason = %msg, "Signature verification failed");
            AppError::Unauthorized(msg)
        }
    })?;

    let ticket = state
        .sessions
        .issue_ticket(&wallet, now)
        .map_err(|e| AppError::Internal(format!("Failed to issue ticket: {}", e)))?;

    tracing::info!(action = "verify_success", wallet = %wallet, "Wallet verified");

    Ok(Json(VerifyResponse {
        verified: true,
        wallet,
        ticket,
    }))
}

/// GET /auth/session — Report the current session
pub async fn get_session(session: Option<AuthSession>) -> impl IntoResponse {
    match session {
        Some(session) => (
            StatusCode::OK,
            Json(SessionStatus {
                authenticated: true,
                wallet: Some(session.wallet),
            }),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(SessionStatus {
                authenticated: false,
                wallet: None,
            }),
        ),
    }
}

/// POST /auth/session — Exchange a verification ticket for a session cookie
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let wallet = req
        .wallet
        .filter(|w| !w.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing wallet address".to_string()))?;

    let now = Utc::now();
    let ticket = req
        .ticket
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing verification ticket".to_string()))?;

    if !state.sessions.check_ticket(&ticket, &wallet, now) {
        tracing::warn!(action = "session_refused", wallet = %wallet, "Invalid verification ticket");
        return Err(AppError::Unauthorized(
            "Invalid or expired verification ticket".to_string(),
        ));
    }

    let cookie = state
        .sessions
        .create_session(&wallet, now)
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;

    tracing::info!(action = "session_created", wallet = %wallet, "Session created");

    Ok((
        jar.add(cookie),
        Json(CreateSessionResponse {
            success: true,
            wallet,
        }),
    ))
}

/// DELETE /auth/session — Log out
pub async fn delete_session(
    State(state): State<AppState>,
    session: Option<AuthSession>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(session) = session {
        tracing::info!(action = "logout", wallet = %session.wallet, "Session deleted");
    }

    (
        jar.add(state.sessions.delete_session()),
        Json(serde_json::json!({ "success": true })),
    )
}
