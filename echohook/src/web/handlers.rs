//! Webhook endpoint handlers.
//!
//! The webhook handler only:
//! 1. Verifies the shared-secret header (and body signature, if configured)
//! 2. Parses the body as JSON
//! 3. Echoes the payload back under `received`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::web::auth::{
    is_secret_configured, verify_body_signature, verify_token, TokenCheck, SIGNATURE_HEADER,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook response envelope.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

impl WebhookResponse {
    fn rejected(status: &'static str) -> Json<Self> {
        Json(Self {
            status,
            received: None,
        })
    }
}

/// Webhook endpoint.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let config = &state.config;

    info!(
        body_length = body.len(),
        has_token_header = headers.contains_key(config.token_header.as_str()),
        "webhook_received"
    );

    let provided = headers
        .get(config.token_header.as_str())
        .map(|v| v.as_bytes());

    match verify_token(&config.webhook_token, provided) {
        TokenCheck::Valid => {}
        TokenCheck::Missing => {
            warn!(header = %config.token_header, "webhook_auth_missing");
            return (
                StatusCode::UNAUTHORIZED,
                WebhookResponse::rejected("unauthorized"),
            );
        }
        TokenCheck::Invalid => {
            warn!(header = %config.token_header, "webhook_auth_invalid");
            return (
                StatusCode::UNAUTHORIZED,
                WebhookResponse::rejected("unauthorized"),
            );
        }
        TokenCheck::NotConfigured => {
            warn!("webhook_auth_not_configured");
        }
    }

    if is_secret_configured(&config.signing_key) {
        let signing_key = config.signing_key.as_deref().unwrap_or_default();
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_body_signature(signing_key, &body, signature) {
            return (
                StatusCode::UNAUTHORIZED,
                WebhookResponse::rejected("invalid_signature"),
            );
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                error = %e,
                body_preview = %String::from_utf8_lossy(&body[..body.len().min(200)]),
                "webhook_invalid_json"
            );
            return (
                StatusCode::BAD_REQUEST,
                WebhookResponse::rejected("invalid_json"),
            );
        }
    };

    info!(payload_kind = json_kind(&payload), "webhook_accepted");

    (
        StatusCode::OK,
        Json(WebhookResponse {
            status: "success",
            received: Some(payload),
        }),
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
