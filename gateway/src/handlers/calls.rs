//! Call control endpoints.
//!
//! `POST /join-agent` is the Twilio voice webhook: it makes sure a room
//! exists, puts an agent in it and answers with TwiML that dials the caller
//! into the room over SIP. `POST /outbound-call` asks Twilio to ring a number
//! whose answer webhook is `/join-agent`.

use std::sync::Arc;

use axum::{
    extract::{
        Form, Query, State,
        rejection::{FormRejection, JsonRejection},
    },
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::agent::AgentSession;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::twilio::{SipTarget, VoiceResponse};
use crate::utils::validate_phone_number;
use crate::videosdk::RoomId;

/// Path of the inbound call webhook.
pub const JOIN_AGENT_PATH: &str = "/join-agent";

const OUTBOUND_FAILURE: &str = "Failed to initiate call";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAgentQuery {
    /// Room to bridge into, set on outbound calls
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Fields of the Twilio voice webhook that are logged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioCallForm {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
}

/// Twilio voice webhook: start an agent and bridge the call into its room.
pub async fn join_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JoinAgentQuery>,
    form: Result<Form<TwilioCallForm>, FormRejection>,
) -> AppResult<Response> {
    let call = match form {
        Ok(Form(call)) => call,
        Err(e) => {
            warn!(error = %e, "Unreadable Twilio call form");
            TwilioCallForm::default()
        }
    };
    info!(
        call_sid = call.call_sid.as_deref().unwrap_or("unknown"),
        from = call.from.as_deref().unwrap_or("unknown"),
        to = call.to.as_deref().unwrap_or("unknown"),
        status = call.call_status.as_deref().unwrap_or("unknown"),
        "Incoming call webhook"
    );

    let config = &state.config;
    let token = config
        .videosdk
        .auth_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Configuration("VIDEOSDK_AUTH_TOKEN is not set".to_string()))?;

    let requested = query
        .room_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| config.agent.room_id.clone().filter(|id| !id.is_empty()));
    let room_id = match requested {
        Some(id) => RoomId::new(id),
        None => state.rooms.create_room().await?,
    };

    let session = AgentSession::initialize(
        room_id.clone(),
        token,
        &config.agent.display_name,
        state.session_deps(),
    );
    let session_id = state.sessions.spawn(session);
    info!(
        call_sid = call.call_sid.as_deref().unwrap_or("unknown"),
        room_id = %room_id,
        session_id = %session_id,
        "Bridging call into room"
    );

    let twiml = VoiceResponse::new()
        .say(config.agent.announcement.clone())
        .dial_sip(SipTarget {
            uri: room_id.sip_uri(&config.videosdk.sip_domain),
            username: config.videosdk.sip_username.clone(),
            password: config.videosdk.sip_password.clone(),
        })
        .to_xml();

    Ok(([(CONTENT_TYPE, "application/xml")], twiml).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallRequest {
    pub phone_number: String,
    /// Room the callee is bridged into; a room is created when absent
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboundCallResponse {
    fn placed(call_sid: String) -> Self {
        Self {
            success: true,
            call_sid: Some(call_sid),
            error: None,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            call_sid: None,
            error: Some(OUTBOUND_FAILURE.to_string()),
        }
    }
}

/// Place an outbound call that joins the agent's room when answered.
///
/// Always answers 200 with a `success` envelope; failure details are logged.
pub async fn outbound_call(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OutboundCallRequest>, JsonRejection>,
) -> Json<OutboundCallResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) => {
            warn!(error = %e, "Invalid outbound call request");
            return Json(OutboundCallResponse::failed());
        }
    };

    let to = match validate_phone_number(&request.phone_number) {
        Ok(number) => number,
        Err(e) => {
            warn!(error = %e, "Rejected outbound call destination");
            return Json(OutboundCallResponse::failed());
        }
    };

    let Some(base_url) = state.config.public_base_url() else {
        error!("BASE_URL is not set, cannot build the call webhook URL");
        return Json(OutboundCallResponse::failed());
    };
    let webhook_url = join_agent_url(base_url, request.meeting_id.as_deref());

    match state.twilio.create_call(&to, &webhook_url).await {
        Ok(call) => {
            info!(
                call_sid = %call.sid,
                room_id = request.meeting_id.as_deref().unwrap_or("new"),
                "Outbound call initiated"
            );
            Json(OutboundCallResponse::placed(call.sid))
        }
        Err(e) => {
            error!(error = %e, "Failed to initiate outbound call");
            Json(OutboundCallResponse::failed())
        }
    }
}

/// Webhook URL for an outbound call, pinned to `room` when given.
pub fn join_agent_url(base_url: &str, room: Option<&str>) -> String {
    match room.map(str::trim).filter(|r| !r.is_empty()) {
        Some(room) => format!(
            "{base_url}{JOIN_AGENT_PATH}?roomId={}",
            url::form_urlencoded::byte_serialize(room.as_bytes()).collect::<String>()
        ),
        None => format!("{base_url}{JOIN_AGENT_PATH}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{RecordingFactory, RecordingMeeting};
    use crate::config::test_config;
    use crate::config::ServerConfig;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn router(config: ServerConfig, meeting: &RecordingMeeting) -> (axum::Router, Arc<AppState>) {
        let state = AppState::with_providers(
            config,
            Arc::new(meeting.clone()),
            Arc::new(RecordingFactory::default()),
        );
        let router = axum::Router::new()
            .route(JOIN_AGENT_PATH, axum::routing::post(join_agent))
            .route("/outbound-call", axum::routing::post(outbound_call))
            .with_state(state.clone());
        (router, state)
    }

    fn twilio_form(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("CallSid=CA1&From=%2B15551234567&To=%2B15550001111"))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn wait_for_join(meeting: &RecordingMeeting) {
        for _ in 0..500 {
            if meeting.join_count() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("agent never joined");
    }

    #[test]
    fn test_join_agent_url() {
        assert_eq!(
            join_agent_url("https://b.example", None),
            "https://b.example/join-agent"
        );
        assert_eq!(
            join_agent_url("https://b.example", Some("ab cd/ef")),
            "https://b.example/join-agent?roomId=ab+cd%2Fef"
        );
        assert_eq!(
            join_agent_url("https://b.example", Some("  ")),
            "https://b.example/join-agent"
        );
    }

    #[tokio::test]
    async fn test_join_agent_uses_room_from_query() {
        let meeting = RecordingMeeting::default();
        let (app, state) = router(test_config(), &meeting);

        let response = app
            .oneshot(twilio_form("/join-agent?roomId=abcd-efgh"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/xml"
        );

        let xml = body_string(response).await;
        assert!(xml.contains("<Say>Thank you for calling. Connecting you to the meeting now.</Say>"));
        assert!(xml.contains(r#"username="sip-user""#));
        assert!(xml.contains(r#"password="sip-pass""#));
        assert!(xml.contains(">sip:abcd-efgh@sip.videosdk.live</Sip>"));

        wait_for_join(&meeting).await;
        assert_eq!(state.sessions.list()[0].room_id, RoomId::new("abcd-efgh"));
        state.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_join_agent_answers_even_if_agent_cannot_join() {
        let meeting = RecordingMeeting {
            reject_join: true,
            ..Default::default()
        };
        let (app, state) = router(test_config(), &meeting);

        let response = tokio::time::timeout(
            Duration::from_secs(2),
            app.oneshot(twilio_form("/join-agent?roomId=abcd-efgh")),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("<Dial><Sip"));

        wait_for_join(&meeting).await;
        for _ in 0..500 {
            if state.sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.sessions.is_empty());
        assert!(meeting.ended().is_empty());
    }

    #[tokio::test]
    async fn test_join_agent_creates_room_when_none_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/rooms"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"roomId": "new-room"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config();
        config.videosdk.api_url = server.uri();
        let meeting = RecordingMeeting::default();
        let (app, state) = router(config, &meeting);

        let response = app.oneshot(twilio_form("/join-agent")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("sip:new-room@"));
        state.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_join_agent_prefers_configured_room() {
        let mut config = test_config();
        config.agent.room_id = Some("fixed-room".to_string());
        let meeting = RecordingMeeting::default();
        let (app, state) = router(config, &meeting);

        let response = app.oneshot(twilio_form("/join-agent")).await.unwrap();
        assert!(body_string(response).await.contains("sip:fixed-room@"));
        state.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_join_agent_room_failure_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/rooms"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let mut config = test_config();
        config.videosdk.api_url = server.uri();
        let meeting = RecordingMeeting::default();
        let (app, state) = router(config, &meeting);

        let response = app.oneshot(twilio_form("/join-agent")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(state.sessions.is_empty());
        assert_eq!(meeting.join_count(), 0);
    }

    #[tokio::test]
    async fn test_join_agent_without_videosdk_token() {
        let mut config = test_config();
        config.videosdk.auth_token = None;
        let meeting = RecordingMeeting::default();
        let (app, _) = router(config, &meeting);

        let response = app
            .oneshot(twilio_form("/join-agent?roomId=r-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_outbound_call_places_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Calls.json"))
            .and(body_string_contains("To=%2B15551234567"))
            .and(body_string_contains(
                "Url=https%3A%2F%2Fbridge.example.com%2Fjoin-agent%3FroomId%3Dabcd-efgh",
            ))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"sid": "CA42", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config();
        config.twilio.api_url = server.uri();
        let (app, _) = router(config, &RecordingMeeting::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/outbound-call")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"phoneNumber": "+1 555 123 4567", "meetingId": "abcd-efgh"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body, json!({"success": true, "callSid": "CA42"}));
    }

    #[tokio::test]
    async fn test_outbound_call_failures_use_envelope() {
        let (app, _) = router(test_config(), &RecordingMeeting::default());
        let failure = json!({"success": false, "error": "Failed to initiate call"});

        for body in ["not json", r#"{"phoneNumber": "12345"}"#, r#"{"meetingId": "x"}"#] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/outbound-call")
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let parsed: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(parsed, failure, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_outbound_call_twilio_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid number"))
            .mount(&server)
            .await;

        let mut config = test_config();
        config.twilio.api_url = server.uri();
        let (app, _) = router(config, &RecordingMeeting::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/outbound-call")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"phoneNumber": "+15551234567"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed["success"], false);
    }
}
