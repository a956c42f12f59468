use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;

use crate::errors::AppError;
use crate::state::AppState;
use crate::twilio::{RequestValidator, SIGNATURE_HEADER};

/// Reject Twilio webhooks that do not carry a valid `X-Twilio-Signature`.
///
/// The signed URL is the configured public base URL plus the request path and
/// query, so the check holds behind proxies that rewrite the host. Form bodies
/// are buffered for the check and handed on unchanged.
///
/// Disabled with `TWILIO_VALIDATE_SIGNATURE=false`.
pub async fn twilio_signature_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.twilio.validate_signature {
        tracing::debug!("Twilio signature validation disabled");
        return Ok(next.run(request).await);
    }

    let auth_token = state
        .config
        .twilio
        .auth_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Configuration(
                "TWILIO_AUTH_TOKEN is required to validate webhooks".to_string(),
            )
        })?;
    let base_url = state.config.public_base_url().ok_or_else(|| {
        AppError::Configuration("BASE_URL is required to validate webhooks".to_string())
    })?;

    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("missing Twilio signature".to_string()))?;

    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{base_url}{path}");

    let (parts, body) = request.into_parts();
    let body_bytes = body
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {e}")))?
        .to_bytes();

    let params: Vec<(String, String)> = url::form_urlencoded::parse(&body_bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if !RequestValidator::new(auth_token).validate(&url, &params, &signature) {
        tracing::warn!(url = %url, "Twilio signature mismatch");
        return Err(AppError::Validation("invalid Twilio signature".to_string()));
    }

    tracing::debug!(url = %url, "Twilio signature verified");
    Ok(next
        .run(Request::from_parts(parts, Body::from(body_bytes)))
        .await)
}
