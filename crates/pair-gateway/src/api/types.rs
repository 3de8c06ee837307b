//! API request and response types.

use serde::{Deserialize, Serialize};

/// Query parameters for the pairing-code endpoint.
#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    /// Target phone number; any non-digit characters are stripped.
    pub number: Option<String>,
}

/// Successful pairing-code response.
#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
