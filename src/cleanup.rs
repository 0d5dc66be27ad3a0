//! Background sweep of expired nonces and idle rate-limit entries.
//!
//! Issuance already evicts expired records, but a server that stops
//! receiving nonce requests would otherwise keep its last batch in
//! memory indefinitely.

use crate::auth::middleware::AuthRateLimiter;
use crate::auth::nonce::NonceStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Run the sweep loop.
///
/// Every `interval`, removes expired nonces and forgets clients whose
/// rate-limit quota has fully refilled. Never returns.
///
/// # Panics
/// If `interval` is zero. `Config::from_env` rejects a zero interval.
pub async fn run_sweep_loop(
    nonces: Arc<NonceStore>,
    limiter: Arc<AuthRateLimiter>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_expired_nonces(&nonces);
        sweep_rate_limits(&limiter);
    }
}

/// Drop limiter state for clients that are back to a full quota.
pub fn sweep_rate_limits(limiter: &AuthRateLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Remove expired nonces once. Returns how many were removed.
pub fn sweep_expired_nonces(nonces: &NonceStore) -> usize {
    let removed = nonces.purge_expired(Utc::now());

    if removed > 0 {
        tracing::info!(
            removed,
            remaining = nonces.len(),
            "Nonce sweep completed"
        );
    }

    removed
}
