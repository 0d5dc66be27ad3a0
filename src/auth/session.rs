//! Signed session cookies and verification tickets.
//!
//! A sealed value is `base64url(json) "." base64url(HMAC-SHA256(json))`.
//! Anything that fails to split, decode, authenticate or deserialize is
//! treated as absent, never as an error surfaced to the client.

use crate::models::{SessionPayload, VerificationTicket};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// `purpose` value of tickets that may be exchanged for a session.
pub const SESSION_TICKET_PURPOSE: &str = "session";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// HMAC key used to seal session payloads.
#[derive(Clone)]
pub struct SessionKey {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SessionKey {
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        if key.is_empty() {
            return Err(SessionError::InvalidKey("key cannot be empty".to_string()));
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| SessionError::InvalidKey(e.to_string()))?;
        Ok(SessionKey { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Serialize and sign a payload.
    pub fn seal<T: Serialize>(&self, payload: &T) -> Result<String, SessionError> {
        let json = serde_json::to_vec(payload)?;
        let mut mac = self.mac();
        mac.update(&json);
        let tag = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&json),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Authenticate and deserialize a sealed payload.
    ///
    /// Returns `None` on any malformed, tampered or foreign value.
    pub fn open<T: DeserializeOwned>(&self, sealed: &str) -> Option<T> {
        let (body_b64, tag_b64) = sealed.split_once('.')?;
        let body = URL_SAFE_NO_PAD.decode(body_b64).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;

        let mut mac = self.mac();
        mac.update(&body);
        // Constant-time comparison
        mac.verify_slice(&tag).ok()?;

        serde_json::from_slice(&body).ok()
    }
}

/// Issues, reads and revokes wallet sessions.
#[derive(Debug)]
pub struct SessionManager {
    key: SessionKey,
    session_ttl: Duration,
    ticket_ttl: Duration,
    secure_cookies: bool,
}

impl SessionManager {
    pub fn new(
        key: SessionKey,
        session_ttl: Duration,
        ticket_ttl: Duration,
        secure_cookies: bool,
    ) -> Self {
        SessionManager {
            key,
            session_ttl,
            ticket_ttl,
            secure_cookies,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Build the session cookie for `wallet`.
    pub fn create_session(
        &self,
        wallet: &str,
        now: DateTime<Utc>,
    ) -> Result<Cookie<'static>, SessionError> {
        let payload = SessionPayload {
            wallet: wallet.to_string(),
            created_at: now.timestamp_millis(),
        };
        let value = self.key.seal(&payload)?;

        Ok(Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.session_ttl.num_seconds()))
            .path("/")
            .build())
    }

    /// Read the session from a cookie value.
    ///
    /// Sessions older than the session TTL are rejected even if the
    /// client kept the cookie past its `Max-Age`.
    pub fn read_value(&self, value: &str, now: DateTime<Utc>) -> Option<SessionPayload> {
        let payload: SessionPayload = self.key.open(value)?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(payload.created_at)?;
        let age = now - created_at;
        if age < -Duration::minutes(1) || age >= self.session_ttl {
            return None;
        }
        Some(payload)
    }

    /// Read the session from the request cookies.
    pub fn read_session(&self, jar: &CookieJar, now: DateTime<Utc>) -> Option<SessionPayload> {
        let cookie = jar.get(SESSION_COOKIE)?;
        self.read_value(cookie.value(), now)
    }

    /// Cookie that instructs the client to drop the session immediately.
    pub fn delete_session(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .path("/")
            .build()
    }

    /// Issue a ticket proving `wallet` just passed signature verification.
    pub fn issue_ticket(&self, wallet: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        self.key.seal(&VerificationTicket {
            wallet: wallet.to_string(),
            purpose: SESSION_TICKET_PURPOSE.to_string(),
            issued_at: now.timestamp_millis(),
        })
    }

    /// Check a ticket for `wallet`. Wallets compare case-insensitively.
    pub fn check_ticket(&self, ticket: &str, wallet: &str, now: DateTime<Utc>) -> bool {
        let Some(ticket) = self.key.open::<VerificationTicket>(ticket) else {
            return false;
        };
        let Some(issued_at) = DateTime::<Utc>::from_timestamp_millis(ticket.issued_at) else {
            return false;
        };
        let age = now - issued_at;
        ticket.purpose == SESSION_TICKET_PURPOSE
            && ticket.wallet.eq_ignore_ascii_case(wallet)
            && age >= -Duration::minutes(1)
            && age < self.ticket_ttl
    }
}
