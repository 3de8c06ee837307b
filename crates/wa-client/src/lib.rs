//! WhatsApp gateway REST API client.
//!
//! The gateway owns the messaging-protocol session; this crate drives its
//! lifecycle: connect a session bound to local credential state, request a
//! linked-device pairing code, poll ordered session events, send messages,
//! and tear the session down.

mod client;
mod error;
mod receiver;
mod types;

pub use client::WaClient;
pub use error::WaError;
pub use receiver::EventReceiver;
pub use types::*;
