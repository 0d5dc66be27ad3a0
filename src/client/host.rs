//! Capabilities of the host wallet application the mini-app runs inside.

use crate::auth::verify::{address_of, sign_in_message, sign_personal_message};
use chrono::Utc;
use k256::ecdsa::SigningKey;
use std::future::Future;
use std::sync::Mutex;

/// Result of an action the user confirms inside the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult<T> {
    Success(T),
    /// The user dismissed the prompt.
    Cancelled,
    /// The host failed, optionally with a message for the user.
    Failed(Option<String>),
}

/// Wallet, signature and signed message returned by host authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuth {
    pub wallet: String,
    pub signature: String,
    pub message: String,
}

/// Tokens the host can deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenName {
    Usdc,
}

impl TokenName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenName::Usdc => "USDC",
        }
    }
}

/// Host wallet SDK.
pub trait HostWallet: Send + Sync {
    /// Whether the app is running inside the host container.
    fn is_in_host(&self) -> bool;

    /// Ask the user to sign in. With a nonce, the signed message embeds it.
    fn authenticate(
        &self,
        nonce: Option<&str>,
    ) -> impl Future<Output = TransactionResult<SignedAuth>> + Send;

    /// Ask the user to confirm a payment of `amount` (decimal string).
    fn deposit(
        &self,
        amount: &str,
        token: TokenName,
    ) -> impl Future<Output = TransactionResult<()>> + Send;
}

/// Host backed by a local secp256k1 key.
///
/// Signs every request and approves every deposit, recording the amounts.
/// Used for local runs and tests.
pub struct KeyWallet {
    key: SigningKey,
    domain: String,
    deposits: Mutex<Vec<String>>,
}

impl KeyWallet {
    pub fn new(key: SigningKey, domain: impl Into<String>) -> Self {
        KeyWallet {
            key,
            domain: domain.into(),
            deposits: Mutex::new(Vec::new()),
        }
    }

    /// Lowercase `0x` address of the key.
    pub fn address(&self) -> String {
        address_of(self.key.verifying_key())
    }

    /// Amounts of the deposits approved so far.
    pub fn deposits(&self) -> Vec<String> {
        self.deposits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for KeyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyWallet")
            .field("address", &self.address())
            .field("domain", &self.domain)
            .finish()
    }
}

impl HostWallet for KeyWallet {
    fn is_in_host(&self) -> bool {
        true
    }

    async fn authenticate(&self, nonce: Option<&str>) -> TransactionResult<SignedAuth> {
        let wallet = self.address();
        let nonce = match nonce {
            Some(nonce) => nonce.to_string(),
            None => crate::auth::nonce::generate_nonce(),
        };
        let message = sign_in_message(&self.domain, &wallet, &nonce, Utc::now());

        match sign_personal_message(&self.key, &message) {
            Ok(signature) => TransactionResult::Success(SignedAuth {
                wallet,
                signature,
                message,
            }),
            Err(e) => TransactionResult::Failed(Some(e.to_string())),
        }
    }

    async fn deposit(&self, amount: &str, token: TokenName) -> TransactionResult<()> {
        tracing::debug!(amount, token = token.as_str(), "Deposit approved by local wallet");
        self.deposits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(amount.to_string());
        TransactionResult::Success(())
    }
}
