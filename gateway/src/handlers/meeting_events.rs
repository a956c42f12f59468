use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::videosdk::WebhookPayload;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// VideoSDK meeting webhook.
///
/// Participant and session events are routed to the agent sessions of the
/// meeting. Event types sessions ignore are acknowledged with
/// `{"delivered": 0}`.
pub async fn meeting_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    body: Result<Json<WebhookPayload>, JsonRejection>,
) -> AppResult<Json<Value>> {
    if let Some(expected) = state
        .config
        .videosdk
        .webhook_token
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        let provided = query.token.as_deref().unwrap_or_default();
        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::Validation("invalid webhook token".to_string()));
        }
    }

    let Json(payload) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let webhook_type = payload.webhook_type.clone();

    let Some((room_id, event)) = payload.into_event() else {
        debug!(webhook_type = %webhook_type, "Ignoring meeting webhook");
        return Ok(Json(json!({ "delivered": 0 })));
    };

    let delivered = state.sessions.dispatch(&room_id, event);
    if delivered == 0 {
        warn!(room_id = %room_id, webhook_type = %webhook_type, "No session for meeting webhook");
    } else {
        info!(
            room_id = %room_id,
            webhook_type = %webhook_type,
            delivered,
            "Meeting webhook dispatched"
        );
    }

    Ok(Json(json!({ "delivered": delivered })))
}
