//! Error types and Axum response conversions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,
}

impl AppError {
    /// Status code and client-facing message.
    ///
    /// Internal errors are logged here with their detail and replaced by a
    /// generic message, so nothing server-side reaches the client.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Rejection for `POST /auth/verify`.
///
/// Same taxonomy as [`AppError`], but every body also carries
/// `"verified": false` so clients can branch on one field.
#[derive(Debug)]
pub struct VerifyRejection(pub AppError);

impl From<AppError> for VerifyRejection {
    fn from(err: AppError) -> Self {
        VerifyRejection(err)
    }
}

impl IntoResponse for VerifyRejection {
    fn into_response(self) -> Response {
        let (status, message) = self.0.status_and_message();

        let body = Json(json!({
            "verified": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
