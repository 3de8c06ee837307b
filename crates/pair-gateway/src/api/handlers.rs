//! HTTP request handlers.

use super::types::{CodeQuery, CodeResponse, HealthResponse};
use super::AppState;
use crate::error::{GatewayError, SetupError};
use crate::session::{new_session_id, sanitize_number, BlobUploader, PairingSession};
use crate::supervisor::RestartReason;
use axum::{
    extract::{Query, State},
    Json,
};
use credential_store::CredentialStore;
use std::sync::Arc;
use tracing::{error, info};
use wa_client::{EventReceiver, WaClient};

/// Buffered session events between the poll loop and the controller.
const EVENT_BUFFER: usize = 64;

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Issue a pairing code for the given number.
///
/// The code is the sole payload of this call; linking, credential delivery,
/// and cleanup continue in a spawned task after the response is sent.
pub async fn request_code(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> Result<Json<CodeResponse>, GatewayError> {
    let number = query
        .number
        .as_deref()
        .and_then(sanitize_number)
        .ok_or(GatewayError::InvalidNumber)?;
    info!(number = %number, "Pairing code requested");

    let session_id = new_session_id(&number);
    let store = CredentialStore::new(state.config.session.dir.join(&session_id));

    let client = match WaClient::new(state.config.gateway.api_url.clone(), session_id.clone()) {
        Ok(client) => client,
        Err(e) => return Err(setup_failure(&state, store, SetupError::Client(e.into())).await),
    };

    let uploader: Arc<dyn BlobUploader> = state.uploader.clone();
    let session = PairingSession::new(
        Arc::new(client.clone()),
        uploader,
        store.clone(),
        state.config.branding.clone(),
        state.config.session.timing(),
        state.supervisor.clone(),
    );

    match session.request_code(&number).await {
        Ok(code) => {
            let events = EventReceiver::new(client, state.config.gateway.poll_interval)
                .channel(EVENT_BUFFER);
            tokio::spawn(session.run(events));
            Ok(Json(CodeResponse { code }))
        }
        Err(e) => Err(setup_failure(&state, store, e).await),
    }
}

/// Fail a request before a code was issued: drop partial local state,
/// signal the supervisor, and map to the 503 response.
async fn setup_failure(
    state: &AppState,
    store: CredentialStore,
    error: SetupError,
) -> GatewayError {
    error!(error = %error, "Session setup failed");
    store.delete().await;
    state.supervisor.request_restart(RestartReason::SetupFailure);
    GatewayError::SessionSetup(error)
}
