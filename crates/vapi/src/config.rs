//! Process-wide Vapi configuration.
//!
//! Built once at startup and handed to the [`CallInitiator`](crate::CallInitiator);
//! nothing here changes after that.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const API_KEY_VAR: &str = "VAPI_API_KEY";
pub const PHONE_NUMBER_ID_VAR: &str = "VAPI_PHONE_NUMBER_ID";
pub const BASE_URL_VAR: &str = "VAPI_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.vapi.ai";

/// Timeout for the call-creation request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Placeholder in [`ModelConfig::system_prompt`] replaced by the caller's task.
pub const TASK_PLACEHOLDER: &str = "{task}";

/// Credentials and endpoint settings.
#[derive(Clone)]
pub struct Config {
    api_key: String,
    pub phone_number_id: String,
    pub base_url: String,
    pub timeout: Duration,
    pub assistant: AssistantConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("phone_number_id", &self.phone_number_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("assistant", &self.assistant)
            .finish()
    }
}

impl Config {
    /// Create a configuration from explicit credentials.
    ///
    /// Both values must be non-empty after trimming.
    pub fn new(api_key: impl Into<String>, phone_number_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        let phone_number_id = phone_number_id.into().trim().to_string();

        if api_key.is_empty() {
            return Err(Error::MissingEnv(API_KEY_VAR));
        }
        if phone_number_id.is_empty() {
            return Err(Error::MissingEnv(PHONE_NUMBER_ID_VAR));
        }

        Ok(Self {
            api_key,
            phone_number_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            assistant: AssistantConfig::default(),
        })
    }

    /// Read `VAPI_API_KEY`, `VAPI_PHONE_NUMBER_ID` and the optional `VAPI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR).ok_or(Error::MissingEnv(API_KEY_VAR))?;
        let phone_number_id =
            lookup(PHONE_NUMBER_ID_VAR).ok_or(Error::MissingEnv(PHONE_NUMBER_ID_VAR))?;

        let mut config = Self::new(api_key, phone_number_id)?;
        if let Some(url) = lookup(BASE_URL_VAR).filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(url);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_assistant(mut self, assistant: AssistantConfig) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// URL of the call-creation endpoint.
    pub fn call_endpoint(&self) -> String {
        format!("{}/call", self.base_url)
    }
}

/// Voice assistant that conducts the call.
///
/// Every field has a default, so a config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantConfig {
    pub name: String,
    pub model: ModelConfig,
    pub voice: VoiceConfig,
    pub transcriber: TranscriberConfig,
    pub end_call_message: String,
    pub client_messages: Vec<String>,
    pub server_messages: Vec<String>,
    pub max_duration_seconds: u32,
    pub background_denoising_enabled: bool,
    pub start_speaking_wait_seconds: f64,
    pub on_punctuation_seconds: f64,
    pub stop_speaking_backoff_seconds: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            model: ModelConfig::default(),
            voice: VoiceConfig::default(),
            transcriber: TranscriberConfig::default(),
            end_call_message: "Thanks, take care!".to_string(),
            client_messages: strings(&[
                "hang",
                "transcript",
                "function-call",
                "conversation-update",
                "speech-update",
                "metadata",
            ]),
            server_messages: strings(&[
                "end-of-call-report",
                "status-update",
                "hang",
                "function-call",
            ]),
            max_duration_seconds: 120,
            background_denoising_enabled: false,
            start_speaking_wait_seconds: 1.2,
            on_punctuation_seconds: 0.4,
            stop_speaking_backoff_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    /// System prompt template; `{task}` is replaced with the caller's task.
    pub system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            system_prompt: "You are an AI assistant making calls on behalf of a client. \
                Your task is: {task}. Be friendly, professional, and natural during the call."
                .to_string(),
        }
    }
}

impl ModelConfig {
    /// Render the system prompt for one call.
    ///
    /// A template without `{task}` gets the task appended on its own line.
    pub fn render_prompt(&self, task: &str) -> String {
        if self.system_prompt.contains(TASK_PLACEHOLDER) {
            self.system_prompt.replace(TASK_PLACEHOLDER, task)
        } else {
            format!("{}\n\nYour task is: {task}", self.system_prompt)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceConfig {
    pub provider: String,
    pub voice_id: String,
    pub model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: "cartesia".to_string(),
            voice_id: "c45bc5ec-dc68-4feb-8829-6e6b2748095d".to_string(),
            model: "sonic-english".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscriberConfig {
    pub provider: String,
    pub model: String,
    pub language: String,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            provider: "deepgram".to_string(),
            model: "nova-2".to_string(),
            language: "en".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
