//! MEGA API types.

use serde::{Deserialize, Serialize};

/// Login request.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response carrying the storage session token.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Upload response carrying the public retrieval link.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub link: String,
}
