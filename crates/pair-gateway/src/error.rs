//! Gateway error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
///
/// Display strings double as the wire `error` field, so they are part of the
/// HTTP contract and must stay stable.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Query param 'number' is required (digits only).")]
    InvalidNumber,

    #[error("Service Unavailable")]
    SessionSetup(#[source] SetupError),

    #[error("Too Many Requests")]
    RateLimitExceeded,
}

/// Failures in the requesting phase, before a pairing code was issued.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("session already linked")]
    AlreadyLinked,

    #[error("protocol client error: {0}")]
    Client(anyhow::Error),

    #[error("credential store error: {0}")]
    Store(#[from] credential_store::StoreError),
}

/// Failures after linking, while delivering the credential bundle.
///
/// These never reach the HTTP caller; the pairing code response has long
/// been sent. They are logged and escalate to a supervisor restart request.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("linked account identity missing from connection event")]
    MissingAccount,

    #[error("credentials file not found after pairing")]
    MissingCredentials,

    #[error("credential store error: {0}")]
    Store(#[from] credential_store::StoreError),

    #[error("upload failed: {0}")]
    Upload(anyhow::Error),

    #[error("send failed: {0}")]
    Send(anyhow::Error),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidNumber => StatusCode::BAD_REQUEST,
            GatewayError::SessionSetup(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
