//! Mini-app side: sign-in against the backend and campaign funding
//! through the host wallet.

pub mod backend;
pub mod funding;
pub mod host;
pub mod orchestrator;

pub use backend::{AuthBackend, BackendError, HttpAuthBackend};
pub use funding::{FundingError, FundingFlow};
pub use host::{HostWallet, KeyWallet, SignedAuth, TokenName, TransactionResult};
pub use orchestrator::{AuthOutcome, AuthState, Orchestrator};
