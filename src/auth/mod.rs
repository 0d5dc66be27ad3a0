//! Sign-in-with-wallet: nonce issuance, signature verification and sessions.

pub mod middleware;
pub mod nonce;
pub mod session;
pub mod verify;

pub use middleware::{AppState, AuthRateLimiter, AuthSession, StateError};
pub use nonce::{generate_nonce, NonceError, NonceStore};
pub use session::{SessionKey, SessionManager, SESSION_COOKIE};
pub use verify::{verify_signed_message, VerifyError};
