//! Web server module for the webhook receiver.
//!
//! Routes:
//! - `POST /webhook` — authenticate, then echo the JSON payload
//! - `GET /health` — liveness probe used by the provisioner

pub mod auth;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::{is_secret_configured, verify_body_signature, verify_token, TokenCheck};
pub use handlers::{health, webhook, AppState, HealthResponse, WebhookResponse};

/// Build the receiver's router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
