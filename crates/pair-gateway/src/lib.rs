//! WhatsApp pairing-code gateway.
//!
//! One HTTP endpoint drives a linked-device pairing handshake: it returns a
//! pairing code synchronously, and once the remote side completes linking it
//! uploads the captured session credentials to remote storage, messages the
//! linked account its session id, and removes all local state.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod supervisor;

pub use config::Config;
pub use error::GatewayError;
