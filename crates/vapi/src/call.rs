//! Outbound call initiation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{self, Assistant, CreateCallRequest, Customer};
use crate::config::Config;
use crate::{Error, Result};

const MIN_E164_DIGITS: usize = 7;
const MAX_E164_DIGITS: usize = 15;

/// A validated request to call someone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    phone_number: String,
    task: String,
}

impl CallRequest {
    /// Validate the destination and task.
    ///
    /// Both are trimmed. The number must look like E.164: a `+` followed by
    /// 7 to 15 digits, the first of which is not zero.
    pub fn new(phone_number: &str, task: &str) -> Result<Self> {
        let phone_number = phone_number.trim();
        let task = task.trim();

        if phone_number.is_empty() {
            return Err(Error::MissingArgument("phone_number"));
        }
        if task.is_empty() {
            return Err(Error::MissingArgument("task"));
        }
        if !is_e164(phone_number) {
            return Err(Error::InvalidPhoneNumber(phone_number.to_string()));
        }

        Ok(Self {
            phone_number: phone_number.to_string(),
            task: task.to_string(),
        })
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn task(&self) -> &str {
        &self.task
    }
}

fn is_e164(number: &str) -> bool {
    let Some(digits) = number.strip_prefix('+') else {
        return false;
    };
    (MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

/// A call Vapi accepted.
#[derive(Debug, Clone, Serialize)]
pub struct CallStarted {
    pub call_id: String,
    /// Vapi's call status at creation time, usually `queued`.
    pub status: Option<String>,
    /// Full response body.
    pub details: Value,
}

/// Outcome of one call attempt.
pub type CallResult = Result<CallStarted>;

/// Places outbound calls through the Vapi REST API.
///
/// Cloning is cheap; clones share the HTTP connection pool and configuration.
#[derive(Debug, Clone)]
pub struct CallInitiator {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl CallInitiator {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Validate the arguments and place the call.
    ///
    /// Invalid arguments fail before any request is sent.
    pub async fn initiate(&self, phone_number: &str, task: &str) -> CallResult {
        let request = CallRequest::new(phone_number, task)?;
        self.place(&request).await
    }

    /// Send exactly one call-creation request. Never retries.
    pub async fn place(&self, request: &CallRequest) -> CallResult {
        info!(
            phone_number = %request.phone_number(),
            task = %request.task(),
            "placing call"
        );

        let body = CreateCallRequest {
            assistant: Assistant::for_task(&self.config.assistant, request.task()),
            phone_number_id: &self.config.phone_number_id,
            customer: Customer {
                number: request.phone_number(),
            },
        };

        let response = self
            .client
            .post(self.config.call_endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = api::error_message(&text, &status.to_string());
            warn!(
                phone_number = %request.phone_number(),
                status = status.as_u16(),
                message = %message,
                "Vapi rejected call"
            );
            return Err(Error::Platform {
                status: status.as_u16(),
                message,
            });
        }

        let (call, details) = api::parse_call(&text)?;
        info!(
            phone_number = %request.phone_number(),
            call_id = %call.id,
            status = call.status.as_deref().unwrap_or("unknown"),
            "call created"
        );

        Ok(CallStarted {
            call_id: call.id,
            status: call.status,
            details,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        let err = if e.is_timeout() {
            Error::Timeout(self.config.timeout)
        } else {
            Error::from(e)
        };
        warn!(error = %err, "call request failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn initiator(base_url: &str) -> CallInitiator {
        let config = Config::new("test-key", "pn-1")
            .unwrap()
            .with_base_url(base_url);
        CallInitiator::new(config).unwrap()
    }

    #[test]
    fn accepts_e164_numbers() {
        let req = CallRequest::new(" +12345678900 ", "  say hi ").unwrap();
        assert_eq!(req.phone_number(), "+12345678900");
        assert_eq!(req.task(), "say hi");
        assert!(CallRequest::new("+442071838750", "x").is_ok());
    }

    #[test]
    fn rejects_empty_arguments() {
        assert!(matches!(
            CallRequest::new("", "task"),
            Err(Error::MissingArgument("phone_number"))
        ));
        assert!(matches!(
            CallRequest::new("+12345678900", "   "),
            Err(Error::MissingArgument("task"))
        ));
    }

    #[test]
    fn rejects_non_e164_numbers() {
        for number in [
            "12345678900",
            "+1-234-567-8900",
            "+0123456789",
            "+123",
            "+1234567890123456",
            "+1234abc5678",
        ] {
            assert!(
                matches!(
                    CallRequest::new(number, "task"),
                    Err(Error::InvalidPhoneNumber(_))
                ),
                "{number} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn success_returns_call_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "phoneNumberId": "pn-1",
                "customer": {"number": "+12345678900"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "abc123", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let started = initiator(&server.uri())
            .initiate("+12345678900", "confirm the booking")
            .await
            .unwrap();
        assert_eq!(started.call_id, "abc123");
        assert_eq!(started.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn task_is_embedded_in_the_assistant_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "c1"})))
            .mount(&server)
            .await;

        initiator(&server.uri())
            .initiate("+12345678900", "ask about opening hours")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = requests[0].body_json().unwrap();
        let prompt = body["assistant"]["model"]["messages"][0]["content"]
            .as_str()
            .unwrap();
        assert!(prompt.contains("ask about opening hours"));
    }

    #[tokio::test]
    async fn platform_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "invalid number"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = initiator(&server.uri())
            .initiate("+12345678900", "task")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Platform { status: 400, .. }));
        assert!(err.to_string().contains("invalid number"));
    }

    #[tokio::test]
    async fn malformed_success_body_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = initiator(&server.uri())
            .initiate("+12345678900", "task")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn invalid_arguments_send_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let initiator = initiator(&server.uri());
        assert!(initiator.initiate("", "task").await.unwrap_err().is_validation());
        assert!(initiator.initiate("+12345678900", "").await.unwrap_err().is_validation());
        assert!(initiator.initiate("555-1234", "task").await.unwrap_err().is_validation());

        server.verify().await;
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        // Nothing listens on port 1.
        let err = initiator("http://127.0.0.1:1")
            .initiate("+12345678900", "task")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect(_)), "got {err:?}");
        assert!(err.to_string().starts_with("connection error"));
    }

    #[tokio::test]
    async fn slow_platform_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = Config::new("test-key", "pn-1")
            .unwrap()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(100));
        let err = CallInitiator::new(config)
            .unwrap()
            .initiate("+12345678900", "task")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_mix_results() {
        let server = MockServer::start().await;
        for (number, id) in [("+12345678900", "call-a"), ("+19876543210", "call-b")] {
            Mock::given(method("POST"))
                .and(body_partial_json(serde_json::json!({"customer": {"number": number}})))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"id": id, "status": "queued"}))
                        .set_delay(Duration::from_millis(if id == "call-a" { 150 } else { 0 })),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let initiator = initiator(&server.uri());
        let (a, b) = tokio::join!(
            initiator.initiate("+12345678900", "first"),
            initiator.initiate("+19876543210", "second"),
        );
        assert_eq!(a.unwrap().call_id, "call-a");
        assert_eq!(b.unwrap().call_id, "call-b");
    }
}
