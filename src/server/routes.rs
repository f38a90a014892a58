//! Webhook route handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bot::dispatcher::Dispatcher;
use crate::bot::telegram::Update;

/// Header Telegram sets when the webhook was registered with a secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub dispatcher: Dispatcher,
    /// When set, requests must carry it in [`SECRET_HEADER`].
    pub webhook_secret: Option<SecretString>,
}

pub type AppState = Arc<ServerState>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /webhooks`: one Telegram update per request.
///
/// Answers 200 for every well-formed update, even when handling it failed,
/// so Telegram does not redeliver it.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(secret.expose_secret().as_str()) {
            warn!("Webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Undecodable webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("update", %request_id, update_id = update.update_id);
    if let Err(e) = state.dispatcher.dispatch(update).instrument(span).await {
        error!(%request_id, error = %e, "Update handling failed");
    }
    StatusCode::OK
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
