//! Filesystem persistence for pairing-session credentials.
//!
//! Each pairing attempt owns one directory holding the protocol client's
//! registration state (`creds.json`) plus auxiliary key-material files.
//! The directory is removed in full once the session is delivered or fails.

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::{CredentialStore, CREDS_FILE};
pub use types::CredentialBundle;
