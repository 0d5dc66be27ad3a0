//! Sign-in flow run by the mini-app when it opens.
//!
//! An existing session is reused. Otherwise, inside the host, the flow
//! fetches a nonce, has the host wallet sign it, verifies the signature
//! with the backend and opens a session with the returned ticket.
//!
//! Every backend call runs under a timeout and nothing is retried; a retry
//! is a new [`Orchestrator::run`].

use super::backend::{AuthBackend, BackendError};
use super::host::{HostWallet, TransactionResult};
use crate::models::VerifyRequest;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_HOST_NAME: &str = "Lemon Cash";
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(15);

/// States visited by a run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    CheckingSession,
    CheckingHostEnvironment,
    RequestingNonce,
    Signing,
    VerifyingSignature,
    CreatingSession,
    Authenticated(String),
    NotInHost,
    Cancelled,
    VerificationFailed(String),
    Failed(String),
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated(_)
                | AuthState::NotInHost
                | AuthState::Cancelled
                | AuthState::VerificationFailed(_)
                | AuthState::Failed(_)
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated { wallet: String },
    /// Opened outside the host container.
    NotInHost,
    /// The user dismissed the signing prompt.
    Cancelled,
    /// The backend refused the signature.
    VerificationFailed { reason: String },
    Failed { reason: String },
}

impl AuthOutcome {
    pub fn wallet(&self) -> Option<&str> {
        match self {
            AuthOutcome::Authenticated { wallet } => Some(wallet),
            _ => None,
        }
    }
}

enum StepError {
    Backend(BackendError),
    Timeout,
}

/// Sign-in state machine over a backend and a host wallet.
pub struct Orchestrator<B, H> {
    backend: B,
    host: H,
    host_name: String,
    step_timeout: Duration,
    history: Vec<AuthState>,
}

impl<B: AuthBackend, H: HostWallet> Orchestrator<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Orchestrator {
            backend,
            host,
            host_name: DEFAULT_HOST_NAME.to_string(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            history: vec![AuthState::Idle],
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = name.into();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// States visited by the last run, starting with `Idle`.
    pub fn history(&self) -> &[AuthState] {
        &self.history
    }

    pub fn state(&self) -> &AuthState {
        self.history.last().unwrap_or(&AuthState::Idle)
    }

    /// User-facing message for an outcome, in the host's language.
    /// `None` when there is nothing to show.
    pub fn user_message(&self, outcome: &AuthOutcome) -> Option<String> {
        match outcome {
            AuthOutcome::Authenticated { .. } => None,
            AuthOutcome::NotInHost => Some(format!(
                "Esta aplicación solo funciona dentro de {}",
                self.host_name
            )),
            AuthOutcome::Cancelled => Some("Autenticación cancelada".to_string()),
            AuthOutcome::VerificationFailed { .. } => Some(
                "No pudimos verificar tu firma. Por favor intentá nuevamente.".to_string(),
            ),
            AuthOutcome::Failed { reason } => Some(reason.clone()),
        }
    }

    fn enter(&mut self, state: AuthState) {
        tracing::debug!(action = "auth_state", state = ?state, "Sign-in state changed");
        self.history.push(state);
    }

    fn finish(&mut self, outcome: AuthOutcome) -> AuthOutcome {
        let state = match &outcome {
            AuthOutcome::Authenticated { wallet } => AuthState::Authenticated(wallet.clone()),
            AuthOutcome::NotInHost => AuthState::NotInHost,
            AuthOutcome::Cancelled => AuthState::Cancelled,
            AuthOutcome::VerificationFailed { reason } => {
                AuthState::VerificationFailed(reason.clone())
            }
            AuthOutcome::Failed { reason } => AuthState::Failed(reason.clone()),
        };

        match &outcome {
            AuthOutcome::Authenticated { wallet } => {
                tracing::info!(action = "sign_in", wallet = %wallet, "Signed in");
            }
            other => {
                tracing::warn!(action = "sign_in", outcome = ?other, "Sign-in did not complete");
            }
        }

        self.enter(state);
        outcome
    }

    async fn step<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, StepError> {
        match tokio::time::timeout(self.step_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StepError::Backend(e)),
            Err(_) => Err(StepError::Timeout),
        }
    }

    fn connectivity_failure(&self) -> AuthOutcome {
        AuthOutcome::Failed {
            reason: format!(
                "No se pudo conectar con {}. Por favor intentá nuevamente más tarde.",
                self.host_name
            ),
        }
    }

    /// Run the flow from `Idle` to a terminal state.
    pub async fn run(&mut self) -> AuthOutcome {
        self.history.clear();
        self.history.push(AuthState::Idle);

        self.enter(AuthState::CheckingSession);
        match self.step(self.backend.session()).await {
            Ok(status) if status.authenticated => {
                if let Some(wallet) = status.wallet {
                    return self.finish(AuthOutcome::Authenticated { wallet });
                }
            }
            Ok(_) => {}
            // Probe failures count as "no session"
            Err(StepError::Backend(e)) => {
                tracing::debug!(error = %e, "Session probe failed");
            }
            Err(StepError::Timeout) => {
                tracing::debug!("Session probe timed out");
            }
        }

        self.enter(AuthState::CheckingHostEnvironment);
        if !self.host.is_in_host() {
            return self.finish(AuthOutcome::NotInHost);
        }

        self.enter(AuthState::RequestingNonce);
        let nonce = match self.step(self.backend.nonce()).await {
            Ok(nonce) => nonce,
            Err(_) => return self.finish(self.connectivity_failure()),
        };

        self.enter(AuthState::Signing);
        let signed = match self.host.authenticate(Some(&nonce)).await {
            TransactionResult::Success(signed) => signed,
            TransactionResult::Cancelled => return self.finish(AuthOutcome::Cancelled),
            TransactionResult::Failed(message) => {
                return self.finish(AuthOutcome::Failed {
                    reason: message.unwrap_or_else(|| "La autenticación falló".to_string()),
                })
            }
        };

        self.enter(AuthState::VerifyingSignature);
        let request = VerifyRequest {
            wallet: Some(signed.wallet.clone()),
            signature: Some(signed.signature),
            message: Some(signed.message),
            nonce: Some(nonce),
        };
        let ticket = match self.step(self.backend.verify(&request)).await {
            Ok(response) if response.verified => response.ticket,
            Ok(_) => {
                return self.finish(AuthOutcome::VerificationFailed {
                    reason: "Invalid signature".to_string(),
                })
            }
            Err(StepError::Backend(BackendError::Status { status, message }))
                if (400..500).contains(&status) =>
            {
                return self.finish(AuthOutcome::VerificationFailed { reason: message })
            }
            Err(_) => return self.finish(self.connectivity_failure()),
        };

        self.enter(AuthState::CreatingSession);
        match self
            .step(self.backend.create_session(&signed.wallet, &ticket))
            .await
        {
            Ok(response) if response.success => {
                self.finish(AuthOutcome::Authenticated { wallet: response.wallet })
            }
            Ok(_) | Err(StepError::Backend(_)) => self.finish(AuthOutcome::Failed {
                reason: "No se pudo crear la sesión. Por favor intentá nuevamente.".to_string(),
            }),
            Err(StepError::Timeout) => self.finish(self.connectivity_failure()),
        }
    }
}
