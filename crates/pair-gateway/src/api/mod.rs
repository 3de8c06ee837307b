//! HTTP API for the pairing gateway.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::config::Config;
use crate::supervisor::Supervisor;
use axum::{middleware as axum_middleware, routing::get, Router};
use mega_client::MegaClient;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
///
/// Everything here is read-only after startup; per-request state lives in
/// the pairing sessions themselves.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide configuration
    pub config: Arc<Config>,
    /// Remote storage client, shared across sessions
    pub uploader: Arc<MegaClient>,
    /// Supervisor restart hook
    pub supervisor: Arc<Supervisor>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, uploader: MegaClient, supervisor: Arc<Supervisor>) -> Self {
        Self {
            config: Arc::new(config),
            uploader: Arc::new(uploader),
            supervisor,
        }
    }
}

/// Create the API router with the configured rate limit.
pub fn create_router(state: AppState) -> Router {
    let per_minute = state.config.rate_limit.global_per_minute;
    create_router_with_rate_limit(state, RateLimitState::new(per_minute))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/code", get(handlers::request_code))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
