//! Credential bundle types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Authentication material produced by the pairing handshake.
///
/// `creds` is the protocol client's registration state and maps to
/// `creds.json` on disk. `keys` holds the auxiliary key-material artifacts,
/// one file per entry. The bundle is replaced wholesale on every
/// credential-update event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// Registration state.
    pub creds: Value,

    /// Auxiliary key material, keyed by artifact name (without extension).
    #[serde(default)]
    pub keys: BTreeMap<String, Value>,
}

impl CredentialBundle {
    /// An unregistered bundle with no key material.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if nothing has been persisted for this session yet.
    pub fn is_empty(&self) -> bool {
        self.creds.is_null() && self.keys.is_empty()
    }
}
