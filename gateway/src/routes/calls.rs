//! Call control route configuration

use axum::{Router, middleware, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::calls::{JOIN_AGENT_PATH, join_agent, outbound_call};
use crate::middleware::twilio_signature_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the call control router
///
/// # Endpoints
///
/// - `POST /join-agent` - Twilio voice webhook, answered with TwiML. Requests
///   must carry a valid `X-Twilio-Signature` unless validation is disabled.
/// - `POST /outbound-call` - Start a call to `phoneNumber`, optionally bridged
///   into `meetingId`.
pub fn create_calls_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let twilio_webhooks = Router::new()
        .route(JOIN_AGENT_PATH, post(join_agent))
        .route_layer(middleware::from_fn_with_state(
            state,
            twilio_signature_middleware,
        ));

    Router::new()
        .route("/outbound-call", post(outbound_call))
        .merge(twilio_webhooks)
        .layer(TraceLayer::new_for_http())
}
