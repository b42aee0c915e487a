//! Webhook delivery: Telegram POSTs each update to `/{path}`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use teloxide::types::Update;

use gcb_core::intake::PushIntake;

use crate::inbound_update;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub struct WebhookState {
    pub intake: PushIntake,
    /// Route segment without slashes; requests to any other path are rejected.
    pub path: String,
    pub secret: Option<String>,
}

pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/{path}", post(handle_update))
        .with_state(state)
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "ok": false, "error": message }))).into_response()
}

/// POST /{path}. Responds only after the update has been fully dispatched.
pub async fn handle_update(
    State(state): State<Arc<WebhookState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if path != state.path {
        return reject(StatusCode::NOT_FOUND, "not found");
    }

    if let Some(expected) = state.secret.as_deref() {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected {
            tracing::warn!("webhook call with missing or wrong secret token");
            return reject(StatusCode::UNAUTHORIZED, "invalid secret token");
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable webhook body");
            return reject(StatusCode::BAD_REQUEST, "invalid update");
        }
    };

    let inbound = inbound_update(&update);
    tracing::debug!(update_id = inbound.id.0, "webhook update received");
    state.intake.accept(inbound).await;

    (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
}
