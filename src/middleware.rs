//! Security headers middleware.
//!
//! Every endpoint returns JSON that must never be cached or rendered as
//! a document, so the headers are the same for all routes.

use crate::auth::middleware::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

/// Adds security headers to all responses.
///
/// - `cache-control: no-store`: session and nonce responses are per-client.
/// - `x-content-type-options: nosniff`, `x-frame-options: DENY`,
///   `referrer-policy: no-referrer`.
/// - `content-security-policy`: nothing may load or frame an API response.
/// - `strict-transport-security`: production only, where cookies are `Secure`.
///
/// # Usage
///
/// ```rust,no_run
/// use axum::{middleware, Router};
/// use minifund::{auth::AppState, config::Config, middleware::security_headers};
///
/// let state = AppState::new(Config::with_secret(&[0u8; 32])).unwrap();
/// let app: Router = Router::new()
///     .layer(middleware::from_fn_with_state(state.clone(), security_headers))
///     .with_state(state);
/// ```
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    if state.config.production {
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
