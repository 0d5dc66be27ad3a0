//! Single-use sign-in nonces.
//!
//! The store is created once at startup and shared through `AppState`.
//! Records expire `ttl` after issuance whether or not they were used;
//! expired records are evicted on every issuance and by the periodic
//! sweep in [`crate::cleanup`].

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Random bytes per nonce (256 bits).
pub const NONCE_BYTES: usize = 32;

/// Generate a cryptographically random nonce.
///
/// Returns a lowercase hex string (64 characters) from 32 random bytes.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// A nonce awaiting consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub issued_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    #[error("Nonce not found")]
    NotFound,

    #[error("Nonce expired")]
    Expired,

    #[error("Nonce already used")]
    AlreadyUsed,
}

/// In-memory table of outstanding nonces.
#[derive(Debug)]
pub struct NonceStore {
    ttl: Duration,
    records: Mutex<HashMap<String, NonceRecord>>,
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        NonceStore {
            ttl,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, NonceRecord>> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned lock is still usable.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, record: &NonceRecord, now: DateTime<Utc>) -> bool {
        now - record.issued_at >= self.ttl
    }

    /// Issue a new nonce and evict expired ones.
    pub fn issue(&self, now: DateTime<Utc>) -> String {
        let mut records = self.lock();

        let mut nonce = generate_nonce();
        while records.contains_key(&nonce) {
            nonce = generate_nonce();
        }

        records.insert(
            nonce.clone(),
            NonceRecord {
                issued_at: now,
                used: false,
            },
        );

        let ttl = self.ttl;
        records.retain(|_, record| now - record.issued_at < ttl);

        nonce
    }

    /// Atomically check that `nonce` exists, is unexpired and unused,
    /// then mark it used.
    pub fn consume(&self, nonce: &str, now: DateTime<Utc>) -> Result<(), NonceError> {
        let mut records = self.lock();

        let record = records.get_mut(nonce).ok_or(NonceError::NotFound)?;

        if self.is_expired(record, now) {
            records.remove(nonce);
            return Err(NonceError::Expired);
        }

        if record.used {
            return Err(NonceError::AlreadyUsed);
        }

        record.used = true;
        Ok(())
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.lock();
        let before = records.len();
        let ttl = self.ttl;
        records.retain(|_, record| now - record.issued_at < ttl);
        before - records.len()
    }

    pub fn get(&self, nonce: &str) -> Option<NonceRecord> {
        self.lock().get(nonce).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
