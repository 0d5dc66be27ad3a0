//! Shared state, session extractor and rate limiting.

use super::nonce::NonceStore;
use super::session::{SessionError, SessionKey, SessionManager};
use crate::config::Config;
use crate::error::AppError;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::convert::Infallible;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-IP limiter for the nonce and verify endpoints.
pub type AuthRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub nonces: Arc<NonceStore>,
    pub sessions: Arc<SessionManager>,
    pub auth_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StateError> {
        let key = SessionKey::new(&config.session_secret)?;
        let sessions = SessionManager::new(
            key,
            ttl(config.session_ttl_secs, "session TTL")?,
            ttl(config.ticket_ttl_secs, "ticket TTL")?,
            config.production,
        );
        let nonces = NonceStore::new(ttl(config.nonce_ttl_secs, "nonce TTL")?);
        let auth_limiter = auth_rate_limiter(config.rate_limit_auth_per_min)?;

        Ok(AppState {
            config: Arc::new(config),
            nonces: Arc::new(nonces),
            sessions: Arc::new(sessions),
            auth_limiter: Arc::new(auth_limiter),
        })
    }
}

fn ttl(secs: u64, name: &'static str) -> Result<Duration, StateError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .filter(|d| !d.is_zero())
        .ok_or(StateError::OutOfRange(name))
}

/// Keyed limiter allowing `per_minute` requests per IP.
///
/// The full quota is available as a burst and refills evenly over the minute.
pub fn auth_rate_limiter(per_minute: u32) -> Result<AuthRateLimiter, StateError> {
    let per_minute = NonZeroU32::new(per_minute).ok_or(StateError::OutOfRange("auth rate limit"))?;
    Ok(RateLimiter::keyed(Quota::per_minute(per_minute)))
}

/// Authenticated session extractor.
///
/// Reads the signed `session` cookie.
/// Returns 401 Unauthorized if missing, forged or expired.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub wallet: String,
    pub created_at: i64,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let session = state
            .sessions
            .read_session(&jar, Utc::now())
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

        Ok(AuthSession {
            wallet: session.wallet,
            created_at: session.created_at,
        })
    }
}

/// `Option<AuthSession>`: `None` when there is no valid session.
/// Never fails the request.
impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(
            <AuthSession as FromRequestParts<AppState>>::from_request_parts(parts, state)
                .await
                .ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn state() -> AppState {
        AppState::new(Config::with_secret(&[9u8; 32])).unwrap()
    }

    #[test]
    fn test_check_rate_limit() {
        let limiter = auth_rate_limiter(3).unwrap();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        let other: IpAddr = "203.0.113.8".parse().unwrap();

        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_ok());
        // Fourth request within the minute is over the limit
        assert!(limiter.check_key(&ip).is_err());
        // Other keys are counted separately
        assert!(limiter.check_key(&other).is_ok());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        assert!(matches!(
            auth_rate_limiter(0),
            Err(StateError::OutOfRange("auth rate limit"))
        ));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let mut config = Config::with_secret(&[9u8; 32]);
        config.session_ttl_secs = 100_000_000_000_000_000;
        assert!(matches!(
            AppState::new(config),
            Err(StateError::OutOfRange("session TTL"))
        ));

        let mut config = Config::with_secret(&[9u8; 32]);
        config.nonce_ttl_secs = u64::MAX;
        assert!(matches!(
            AppState::new(config),
            Err(StateError::OutOfRange("nonce TTL"))
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            AppState::new(Config::with_secret(&[])),
            Err(StateError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_auth_session_from_cookie() {
        let state = state();
        let cookie = state
            .sessions
            .create_session("0x1234567890123456789012345678901234567890", Utc::now())
            .unwrap();

        let request = Request::builder()
            .header("cookie", format!("{}={}", cookie.name(), cookie.value()))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let session =
            <AuthSession as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await
                .unwrap();
        assert_eq!(session.wallet, "0x1234567890123456789012345678901234567890");
    }

    #[tokio::test]
    async fn test_auth_session_missing_cookie() {
        let state = state();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let result =
            <AuthSession as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let optional = <AuthSession as OptionalFromRequestParts<AppState>>::from_request_parts(
            &mut parts, &state,
        )
        .await
        .unwrap();
        assert!(optional.is_none());
    }
}
