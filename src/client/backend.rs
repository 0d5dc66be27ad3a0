//! Client for the `/auth` endpoints.

use crate::models::{
    CreateSessionRequest, CreateSessionResponse, NonceResponse, SessionStatus, VerifyRequest,
    VerifyResponse,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connection, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not what the endpoint returns.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// A 4xx answer: the backend understood the request and refused it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BackendError::Status { status, .. } if (400..500).contains(status))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Backend operations the sign-in flow needs.
pub trait AuthBackend: Send + Sync {
    /// `GET /auth/session`. An unauthenticated answer is not an error.
    fn session(&self) -> impl Future<Output = Result<SessionStatus, BackendError>> + Send;

    /// `POST /auth/nonce`.
    fn nonce(&self) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// `POST /auth/verify`.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, BackendError>> + Send;

    /// `POST /auth/session`.
    fn create_session(
        &self,
        wallet: &str,
        ticket: &str,
    ) -> impl Future<Output = Result<CreateSessionResponse, BackendError>> + Send;

    /// `DELETE /auth/session`.
    fn end_session(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// [`AuthBackend`] over HTTP. Keeps the session cookie between calls.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

impl HttpAuthBackend {
    /// `base_url` is the origin serving `/auth/*`, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(HttpAuthBackend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decode a success body, or turn an error status into [`BackendError::Status`]
/// carrying the body's `error` field.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"]
        .as_str()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or_default())
        .to_string();

    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

impl AuthBackend for HttpAuthBackend {
    async fn session(&self) -> Result<SessionStatus, BackendError> {
        let response = self.client.get(self.url("/auth/session")).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(SessionStatus {
                authenticated: false,
                wallet: None,
            });
        }
        decode(response).await
    }

    async fn nonce(&self) -> Result<String, BackendError> {
        let response = self.client.post(self.url("/auth/nonce")).send().await?;
        let body: NonceResponse = decode(response).await?;
        Ok(body.nonce)
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, BackendError> {
        let response = self
            .client
            .post(self.url("/auth/verify"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_session(
        &self,
        wallet: &str,
        ticket: &str,
    ) -> Result<CreateSessionResponse, BackendError> {
        let body = CreateSessionRequest {
            wallet: Some(wallet.to_string()),
            ticket: Some(ticket.to_string()),
        };
        let response = self
            .client
            .post(self.url("/auth/session"))
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    async fn end_session(&self) -> Result<(), BackendError> {
        let response = self.client.delete(self.url("/auth/session")).send().await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let rejected = BackendError::Status {
            status: 401,
            message: "Invalid signature".to_string(),
        };
        assert!(rejected.is_client_error());
        assert_eq!(rejected.to_string(), "401: Invalid signature");

        let server = BackendError::Status {
            status: 500,
            message: "Internal server error".to_string(),
        };
        assert!(!server.is_client_error());
        assert!(!BackendError::Transport("refused".to_string()).is_client_error());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpAuthBackend::new("http://127.0.0.1:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/auth/nonce"), "http://127.0.0.1:3000/auth/nonce");
    }
}
