//! WhatsApp gateway HTTP client.

use crate::error::WaError;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

/// HTTP client for one gateway session.
///
/// The gateway speaks the messaging protocol; this client only drives the
/// session lifecycle (connect, pair, events, send, disconnect) and treats
/// everything behind it as opaque.
#[derive(Clone)]
pub struct WaClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WaClient {
    /// Create a client bound to one gateway session.
    pub fn new(
        base_url: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, WaError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            session_id: session_id.into(),
        })
    }

    /// The session this client is bound to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Check if the gateway is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Bind the gateway session to the supplied credential state and report
    /// its registration status.
    #[instrument(skip(self, request))]
    pub async fn connect(&self, request: &ConnectRequest) -> Result<SessionStatus, WaError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/sessions/{}/connect",
                self.base_url,
                encode(&self.session_id)
            ))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(WaError::Api(msg));
        }

        let status: SessionStatus = response.json().await?;
        debug!(registered = status.registered, "Session connected");
        Ok(status)
    }

    /// Request a linked-device pairing code for a digits-only number.
    #[instrument(skip(self))]
    pub async fn request_pairing_code(&self, number: &str) -> Result<String, WaError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/sessions/{}/pair",
                self.base_url,
                encode(&self.session_id)
            ))
            .json(&serde_json::json!({ "number": number }))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Pairing code request failed: {}", msg);
            return Err(WaError::PairingFailed(msg));
        }

        let body: PairingCodeResponse = response.json().await?;
        Ok(body.code)
    }

    /// Drain pending session events, in emission order.
    #[instrument(skip(self))]
    pub async fn fetch_events(&self) -> Result<Vec<GatewayEvent>, WaError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/sessions/{}/events",
                self.base_url,
                encode(&self.session_id)
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(WaError::Api(msg));
        }

        let events: Vec<GatewayEvent> = response.json().await?;
        debug!("Received {} events", events.len());
        Ok(events)
    }

    /// Send a plain text message.
    #[instrument(skip(self, text))]
    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<(), WaError> {
        self.send(SendMessageRequest {
            recipient: recipient.to_string(),
            text: Some(text.to_string()),
            image: None,
        })
        .await
    }

    /// Send an image message with a caption.
    #[instrument(skip(self, caption))]
    pub async fn send_image(
        &self,
        recipient: &str,
        url: &str,
        caption: &str,
    ) -> Result<(), WaError> {
        self.send(SendMessageRequest {
            recipient: recipient.to_string(),
            text: None,
            image: Some(ImagePayload {
                url: url.to_string(),
                caption: caption.to_string(),
            }),
        })
        .await
    }

    /// Tear down the gateway session.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<(), WaError> {
        let response = self
            .client
            .delete(format!(
                "{}/v1/sessions/{}",
                self.base_url,
                encode(&self.session_id)
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(WaError::Api(msg));
        }

        debug!("Session disconnected");
        Ok(())
    }

    async fn send(&self, request: SendMessageRequest) -> Result<(), WaError> {
        let recipient = request.recipient.clone();
        let response = self
            .client
            .post(format!(
                "{}/v1/sessions/{}/send",
                self.base_url,
                encode(&self.session_id)
            ))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Send failed: {}", msg);
            return Err(WaError::SendFailed(msg));
        }

        debug!("Sent message to {}", recipient);
        Ok(())
    }
}
