pub mod api;
pub mod calls;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// All application routes with state applied.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(calls::create_calls_router(state.clone()))
        .merge(webhooks::create_webhook_router())
        .with_state(state)
}
