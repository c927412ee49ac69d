//! Vapi REST wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AssistantConfig;
use crate::{Error, Result};

/// Body of `POST /call`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCallRequest<'a> {
    pub assistant: Assistant<'a>,
    pub phone_number_id: &'a str,
    pub customer: Customer<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Customer<'a> {
    pub number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Assistant<'a> {
    model: Model<'a>,
    voice: Voice<'a>,
    end_call_message: &'a str,
    name: &'a str,
    transcriber: Transcriber<'a>,
    client_messages: &'a [String],
    server_messages: &'a [String],
    max_duration_seconds: u32,
    background_denoising_enabled: bool,
    start_speaking_plan: StartSpeakingPlan,
    stop_speaking_plan: StopSpeakingPlan,
}

impl<'a> Assistant<'a> {
    /// Build the inline assistant for one call, with `task` as its objective.
    pub fn for_task(config: &'a AssistantConfig, task: &str) -> Self {
        Self {
            model: Model {
                provider: &config.model.provider,
                model: &config.model.model,
                messages: vec![ModelMessage {
                    role: "system",
                    content: config.model.render_prompt(task),
                }],
                temperature: config.model.temperature,
            },
            voice: Voice {
                provider: &config.voice.provider,
                voice_id: &config.voice.voice_id,
                model: &config.voice.model,
            },
            end_call_message: &config.end_call_message,
            name: &config.name,
            transcriber: Transcriber {
                provider: &config.transcriber.provider,
                model: &config.transcriber.model,
                language: &config.transcriber.language,
            },
            client_messages: &config.client_messages,
            server_messages: &config.server_messages,
            max_duration_seconds: config.max_duration_seconds,
            background_denoising_enabled: config.background_denoising_enabled,
            start_speaking_plan: StartSpeakingPlan {
                wait_seconds: config.start_speaking_wait_seconds,
                transcription_endpointing_plan: TranscriptionEndpointingPlan {
                    on_punctuation_seconds: config.on_punctuation_seconds,
                },
            },
            stop_speaking_plan: StopSpeakingPlan {
                backoff_seconds: config.stop_speaking_backoff_seconds,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Model<'a> {
    provider: &'a str,
    model: &'a str,
    messages: Vec<ModelMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ModelMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Voice<'a> {
    provider: &'a str,
    voice_id: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct Transcriber<'a> {
    provider: &'a str,
    model: &'a str,
    language: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSpeakingPlan {
    wait_seconds: f64,
    transcription_endpointing_plan: TranscriptionEndpointingPlan,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptionEndpointingPlan {
    on_punctuation_seconds: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopSpeakingPlan {
    backoff_seconds: f64,
}

/// The fields we need from a created call. Vapi returns many more.
#[derive(Debug, Deserialize)]
pub(crate) struct CallResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Vapi error body, e.g. `{"message": "...", "error": "Bad Request", "statusCode": 400}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<ErrorMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// Validation failures come back as a list of messages.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

/// Parse a 2xx body. Anything without a string `id` is a malformed response.
pub(crate) fn parse_call(body: &str) -> Result<(CallResponse, Value)> {
    let details: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("body is not JSON: {e}")))?;
    let call = CallResponse::deserialize(&details)
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;
    Ok((call, details))
}

/// Best human-readable message from an error body.
///
/// Falls back to the raw body, then to `fallback` when the body is empty.
pub(crate) fn error_message(body: &str, fallback: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    match (parsed.message, parsed.error) {
        (Some(ErrorMessage::One(message)), _) if !message.is_empty() => message,
        (Some(ErrorMessage::Many(messages)), _) if !messages.is_empty() => messages.join("; "),
        (_, Some(error)) if !error.is_empty() => error,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => fallback.to_string(),
    }
}
