//! Gateway API types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default WhatsApp user server suffix.
const USER_SERVER: &str = "s.whatsapp.net";

/// Request to bind a gateway session to local credential state.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub creds: Value,
    pub keys: BTreeMap<String, Value>,
}

/// Gateway session status.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    /// True once the account has completed linking.
    pub registered: bool,
}

/// Pairing code issued for a linked-device handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingCodeResponse {
    pub code: String,
}

/// Event emitted by the gateway for one session, in emission order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayEvent {
    /// Updated credential material to persist locally.
    #[serde(rename = "creds.update")]
    CredsUpdate {
        creds: Value,
        #[serde(default)]
        keys: BTreeMap<String, Value>,
    },

    /// Connection-state transition.
    #[serde(rename = "connection.update")]
    ConnectionUpdate {
        connection: ConnectionState,
        /// Own account JID, present once the connection is open.
        #[serde(default)]
        account: Option<String>,
        /// Disconnect reason code, present on close.
        #[serde(default, rename = "statusCode")]
        status_code: Option<u16>,
    },
}

/// Connection state of a gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Domain-level session event consumed by the pairing controller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Credential material changed; must be persisted write-through.
    Creds {
        creds: Value,
        keys: BTreeMap<String, Value>,
    },
    /// Connection-state transition.
    Connection(ConnectionUpdate),
}

/// Connection transition with disconnect metadata.
#[derive(Debug, Clone)]
pub struct ConnectionUpdate {
    pub state: ConnectionState,
    pub account: Option<String>,
    pub status_code: Option<u16>,
}

/// Disconnect code the protocol reports for an invalid or expired session.
pub const DISCONNECT_UNAUTHORIZED: u16 = 401;

impl ConnectionUpdate {
    /// True when the disconnect is terminal and must not be retried.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == Some(DISCONNECT_UNAUTHORIZED)
    }
}

impl From<GatewayEvent> for SessionEvent {
    fn from(event: GatewayEvent) -> Self {
        match event {
            GatewayEvent::CredsUpdate { creds, keys } => SessionEvent::Creds { creds, keys },
            GatewayEvent::ConnectionUpdate {
                connection,
                account,
                status_code,
            } => SessionEvent::Connection(ConnectionUpdate {
                state: connection,
                account,
                status_code,
            }),
        }
    }
}

/// Outgoing message request.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

/// Image attachment with caption.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePayload {
    pub url: String,
    pub caption: String,
}

/// Normalize an account JID to its bare user form.
///
/// The gateway reports the linked account with a device suffix
/// (`94771234567:3@s.whatsapp.net`); messages must be addressed to the bare
/// user (`94771234567@s.whatsapp.net`). Bare numbers get the default server.
pub fn normalize_jid(raw: &str) -> String {
    let (user, server) = match raw.split_once('@') {
        Some((user, server)) => (user, server),
        None => (raw, USER_SERVER),
    };
    let user = user.split(':').next().unwrap_or(user);
    format!("{user}@{server}")
}
