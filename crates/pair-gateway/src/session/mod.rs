//! Pairing session orchestration.

mod controller;

pub use controller::{PairingSession, SessionTiming};

use async_trait::async_trait;
use credential_store::CredentialBundle;
use mega_client::MegaClient;
use rand::distributions::Alphanumeric;
use rand::Rng;
use wa_client::{ConnectRequest, WaClient};

/// Public prefix stripped from storage links before display. Downstream
/// tooling expects the shortened "session string" form.
const MEGA_FILE_PREFIX: &str = "https://mega.nz/file/";

/// Outbound message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Text(String),
    Image { url: String, caption: String },
}

/// Protocol session client as consumed by the controller.
///
/// The concrete transport is opaque here; anything that can bind a session,
/// issue a pairing code, and send messages is substitutable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Bind the session to the given credential state. Returns whether the
    /// account is already linked.
    async fn bind(&self, bundle: &CredentialBundle) -> anyhow::Result<bool>;

    /// Request a linked-device pairing code for a digits-only number.
    async fn pairing_code(&self, number: &str) -> anyhow::Result<String>;

    /// Send a message to a normalized recipient identity.
    async fn send(&self, recipient: &str, message: Outgoing) -> anyhow::Result<()>;

    /// Tear down the protocol session.
    async fn disconnect(&self) -> anyhow::Result<()>;
}

/// Remote blob uploader as consumed by the controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Upload a named blob; returns its public retrieval locator.
    async fn upload(&self, data: Vec<u8>, name: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl SessionClient for WaClient {
    async fn bind(&self, bundle: &CredentialBundle) -> anyhow::Result<bool> {
        let request = ConnectRequest {
            creds: bundle.creds.clone(),
            keys: bundle.keys.clone(),
        };
        let status = self.connect(&request).await?;
        Ok(status.registered)
    }

    async fn pairing_code(&self, number: &str) -> anyhow::Result<String> {
        Ok(self.request_pairing_code(number).await?)
    }

    async fn send(&self, recipient: &str, message: Outgoing) -> anyhow::Result<()> {
        match message {
            Outgoing::Text(text) => self.send_text(recipient, &text).await?,
            Outgoing::Image { url, caption } => {
                self.send_image(recipient, &url, &caption).await?
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        Ok(WaClient::disconnect(self).await?)
    }
}

#[async_trait]
impl BlobUploader for MegaClient {
    async fn upload(&self, data: Vec<u8>, name: &str) -> anyhow::Result<String> {
        Ok(MegaClient::upload(self, data, name).await?)
    }
}

/// Strip everything but digits from a raw phone number.
pub fn sanitize_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Session id unique per request, so concurrent attempts for the same
/// number never share local state.
pub fn new_session_id(number: &str) -> String {
    format!("{number}-{}", hex::encode(rand::random::<[u8; 4]>()))
}

/// Random upload name: six alphanumerics plus an integer below 10^4.
pub fn random_blob_name() -> String {
    let mut rng = rand::thread_rng();
    let prefix: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{prefix}{}", rng.gen_range(0..10_000))
}

/// Display form of a storage locator.
pub fn display_session_id(link: &str) -> &str {
    link.strip_prefix(MEGA_FILE_PREFIX).unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_number_strips_formatting() {
        assert_eq!(
            sanitize_number("+94 (77) 123-4567").as_deref(),
            Some("94771234567")
        );
        assert_eq!(sanitize_number("94771234567").as_deref(), Some("94771234567"));
    }

    #[test]
    fn test_sanitize_number_rejects_digitless_input() {
        assert_eq!(sanitize_number(""), None);
        assert_eq!(sanitize_number("abc"), None);
        assert_eq!(sanitize_number("+-() "), None);
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let a = new_session_id("94771234567");
        let b = new_session_id("94771234567");
        assert!(a.starts_with("94771234567-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_blob_name_shape() {
        let name = random_blob_name();
        assert!(name.len() >= 7 && name.len() <= 10);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(name.chars().skip(6).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_display_session_id_strips_known_prefix() {
        assert_eq!(display_session_id("https://mega.nz/file/XYZ123"), "XYZ123");
        assert_eq!(display_session_id("XYZ123"), "XYZ123");
    }
}
