//! Twilio REST client for placing outbound calls.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TwilioConfig;

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("Twilio is not configured: {0}")]
    Configuration(String),

    #[error("Twilio API unreachable: {0}")]
    Unreachable(String),

    #[error("Twilio API returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Unexpected Twilio response: {0}")]
    Protocol(String),
}

/// A call accepted by Twilio.
#[derive(Debug, Clone, Deserialize)]
pub struct CallInfo {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    api_url: String,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioClient")
            .field("api_url", &self.api_url)
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl TwilioClient {
    pub fn new(config: &TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    /// Place a call to `to` whose call-control webhook is `webhook_url`.
    ///
    /// Twilio requests the webhook with `POST` once the callee answers.
    pub async fn create_call(&self, to: &str, webhook_url: &str) -> Result<CallInfo, TelephonyError> {
        let (Some(sid), Some(token)) = (self.account_sid.as_deref(), self.auth_token.as_deref())
        else {
            return Err(TelephonyError::Configuration(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN are required".to_string(),
            ));
        };
        let from = self.from_number.as_deref().ok_or_else(|| {
            TelephonyError::Configuration("TWILIO_PHONE_NUMBER is not set".to_string())
        })?;

        let url = format!("{}/2010-04-01/Accounts/{}/Calls.json", self.api_url, sid);
        let params = [
            ("To", to),
            ("From", from),
            ("Url", webhook_url),
            ("Method", "POST"),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth(sid, Some(token))
            .form(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TelephonyError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Twilio rejected call request");
            return Err(TelephonyError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let call: CallInfo = response
            .json()
            .await
            .map_err(|e| TelephonyError::Protocol(e.to_string()))?;

        info!(call_sid = %call.sid, "Outbound call created");
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str) -> TwilioConfig {
        TwilioConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("twilio-secret".to_string()),
            from_number: Some("+15550001111".to_string()),
            api_url: api_url.to_string(),
            request_timeout_seconds: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Calls.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15551234567"))
            .and(body_string_contains("From=%2B15550001111"))
            .and(body_string_contains("Method=POST"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"sid": "CA42", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TwilioClient::new(&config(&server.uri()));
        let call = client
            .create_call("+15551234567", "https://bridge.example.com/join-agent")
            .await
            .unwrap();
        assert_eq!(call.sid, "CA42");
        assert_eq!(call.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.auth_token = None;
        let client = TwilioClient::new(&cfg);
        assert!(matches!(
            client.create_call("+15551234567", "https://x/join-agent").await,
            Err(TelephonyError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number."
            })))
            .mount(&server)
            .await;

        let client = TwilioClient::new(&config(&server.uri()));
        match client.create_call("+15551234567", "https://x/join-agent").await {
            Err(TelephonyError::Remote { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("21211"));
            }
            other => panic!("expected Remote error, got {other:?}"),
        }
    }
}
