//! MEGA remote storage client.
//!
//! Minimal surface for the pairing gateway: authenticate with account
//! credentials and upload one blob, returning its public retrieval link.

mod client;
mod error;
mod types;

pub use client::MegaClient;
pub use error::MegaError;
pub use types::*;
