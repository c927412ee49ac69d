//! The `make_call` MCP tool.

use mcp::{CallToolResult, Tool, ToolHandler};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::call::{CallInitiator, CallStarted};
use crate::{Error, Result};

/// Name of the only tool this server exposes.
pub const MAKE_CALL: &str = "make_call";

const MAKE_CALL_DESCRIPTION: &str = "Make an outbound phone call with an AI voice assistant. \
    Args: phone_number (E.164 format, e.g. +12345678900), task (what the assistant should \
    accomplish on the call).";

#[derive(Debug, Default, Deserialize)]
struct MakeCallArgs {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    task: Option<String>,
}

/// Exposes [`CallInitiator`] to MCP hosts as the `make_call` tool.
pub struct CallTools {
    initiator: CallInitiator,
}

impl CallTools {
    pub fn new(initiator: CallInitiator) -> Self {
        Self { initiator }
    }

    /// Definition advertised through `tools/list`.
    pub fn make_call_tool() -> Tool {
        Tool {
            name: MAKE_CALL.to_string(),
            description: Some(MAKE_CALL_DESCRIPTION.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "phone_number": {
                        "type": "string",
                        "description": "Number to call in E.164 format, e.g. +12345678900"
                    },
                    "task": {
                        "type": "string",
                        "description": "What the assistant should accomplish on the call"
                    }
                },
                "required": ["phone_number", "task"]
            }),
        }
    }

    async fn make_call(&self, arguments: Option<Value>) -> Result<CallStarted> {
        let args: MakeCallArgs = match arguments {
            None | Some(Value::Null) => MakeCallArgs::default(),
            Some(value) if !value.is_object() => {
                return Err(Error::InvalidArguments(
                    "arguments must be an object".to_string(),
                ));
            }
            Some(value) => {
                serde_json::from_value(value).map_err(|e| Error::InvalidArguments(e.to_string()))?
            }
        };

        let phone_number = args.phone_number.unwrap_or_default();
        let task = args.task.unwrap_or_default();
        self.initiator.initiate(&phone_number, &task).await
    }
}

impl ToolHandler for CallTools {
    fn tools(&self) -> Vec<Tool> {
        vec![Self::make_call_tool()]
    }

    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> mcp::Result<CallToolResult> {
        if name != MAKE_CALL {
            return Err(mcp::Error::ToolNotFound(name.to_string()));
        }

        let result = match self.make_call(arguments).await {
            Ok(started) => CallToolResult::text(success_payload(&started)),
            Err(e) => {
                info!(error = %e, "make_call failed");
                CallToolResult::error(format!("Failed to place call: {e}"))
            }
        };
        Ok(result)
    }
}

fn success_payload(started: &CallStarted) -> String {
    let message = match &started.status {
        Some(status) => format!("Call has been {status}"),
        None => "Call has been created".to_string(),
    };
    let payload = json!({
        "status": "success",
        "message": message,
        "call_id": started.call_id,
        "call_status": started.status,
        "details": started.details,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tools(base_url: &str) -> CallTools {
        let config = Config::new("test-key", "pn-1")
            .unwrap()
            .with_base_url(base_url);
        CallTools::new(CallInitiator::new(config).unwrap())
    }

    async fn silent_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn schema_requires_both_arguments() {
        let tool = CallTools::make_call_tool();
        assert_eq!(tool.name, "make_call");
        assert_eq!(tool.input_schema["required"], json!(["phone_number", "task"]));
        assert_eq!(tool.input_schema["properties"]["task"]["type"], "string");
    }

    #[tokio::test]
    async fn unknown_tool_is_protocol_error() {
        let server = silent_server().await;
        let err = tools(&server.uri()).call_tool("hang_up", None).await.unwrap_err();
        assert!(matches!(err, mcp::Error::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn missing_or_empty_arguments_fail_without_a_request() {
        let server = silent_server().await;
        let tools = tools(&server.uri());

        let cases = [
            None,
            Some(json!({})),
            Some(json!({"task": "say hi"})),
            Some(json!({"phone_number": "+12345678900"})),
            Some(json!({"phone_number": "", "task": "say hi"})),
            Some(json!({"phone_number": "+12345678900", "task": "  "})),
            Some(json!({"phone_number": 12345678900u64, "task": "say hi"})),
            Some(json!(["+12345678900", "say hi"])),
            Some(json!("+12345678900")),
        ];
        for args in cases {
            let result = tools.call_tool(MAKE_CALL, args.clone()).await.unwrap();
            assert!(result.is_error, "{args:?} should fail");
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn success_reports_call_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "abc123", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = tools(&server.uri())
            .call_tool(
                MAKE_CALL,
                Some(json!({"phone_number": "+12345678900", "task": "say hi"})),
            )
            .await
            .unwrap();

        assert!(!result.is_error);
        let payload: Value = serde_json::from_str(&result.joined_text()).unwrap();
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["call_id"], "abc123");
        assert_eq!(payload["message"], "Call has been queued");
    }

    #[tokio::test]
    async fn platform_error_is_shown_to_the_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "invalid number"})),
            )
            .mount(&server)
            .await;

        let result = tools(&server.uri())
            .call_tool(
                MAKE_CALL,
                Some(json!({"phone_number": "+12345678900", "task": "say hi"})),
            )
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.joined_text().contains("invalid number"));
    }

    #[tokio::test]
    async fn connection_failure_is_a_result() {
        let result = tools("http://127.0.0.1:1")
            .call_tool(
                MAKE_CALL,
                Some(json!({"phone_number": "+12345678900", "task": "say hi"})),
            )
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.joined_text().contains("connection error"));
    }
}
