use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::meeting_events::meeting_webhook;
use crate::state::{AppState, MEETING_WEBHOOK_PATH};
use std::sync::Arc;

/// Create the VideoSDK webhook router
///
/// `POST /videosdk/webhook` receives participant and session events for
/// rooms created by this server. When `VIDEOSDK_WEBHOOK_TOKEN` is set, the
/// registered URL carries it as `?token=` and requests without it are refused.
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEETING_WEBHOOK_PATH, post(meeting_webhook))
        .layer(TraceLayer::new_for_http())
}
