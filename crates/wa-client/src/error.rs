//! Gateway client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gateway error: {0}")]
    Api(String),

    #[error("Pairing request failed: {0}")]
    PairingFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}
