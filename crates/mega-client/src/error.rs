//! MEGA client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MegaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}
