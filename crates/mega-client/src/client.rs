//! MEGA storage HTTP client.

use crate::error::MegaError;
use crate::types::*;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// MEGA remote storage client.
///
/// The account password is stored as a `SecretString` to keep it out of
/// logs and debug output.
#[derive(Clone)]
pub struct MegaClient {
    client: Client,
    base_url: String,
    email: String,
    password: SecretString,
}

impl MegaClient {
    /// Create a new storage client.
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MegaError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            email: email.into(),
            password: SecretString::new(password.into()),
        })
    }

    /// Upload a named blob and return its public retrieval link.
    ///
    /// Single attempt: authentication or transfer failures surface as
    /// descriptive errors and are never retried here.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload(&self, data: Vec<u8>, name: &str) -> Result<String, MegaError> {
        let token = self.login().await?;
        debug!("Logged into storage, uploading {}", name);

        let response = self
            .client
            .post(format!("{}/v1/upload", self.base_url))
            .header("Authorization", format!("Bearer {token}"))
            .query(&[("name", name)])
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Upload failed: {}", msg);
            return Err(MegaError::Upload(msg));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MegaError::Upload(e.to_string()))?;
        debug!("Upload complete: {}", body.link);
        Ok(body.link)
    }

    async fn login(&self) -> Result<String, MegaError> {
        let request = LoginRequest {
            email: self.email.clone(),
            password: self.password.expose_secret().to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/login", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(MegaError::Auth(msg));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| MegaError::Auth(e.to_string()))?;
        Ok(body.token)
    }
}
