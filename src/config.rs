use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::env;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/v1/chat/completions";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant helping me get the most out of a \
     self-hosted Qwen3 API. Help me build a personal system around it.";
pub const DEFAULT_TEMPERATURE: &str = "0.9";
pub const FALLBACK_TEMPERATURE: f64 = 0.9;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Temperature must be a number between 0.0 and 1.0 (got '{0}')")]
    InvalidTemperature(String),
}

/// Parses a user-supplied temperature, accepting only finite values in `[0, 1]`.
pub fn parse_temperature(raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
        .ok_or_else(|| ConfigError::InvalidTemperature(raw.to_string()))
}

/// Defaults consulted when neither the config document nor a flag supplies a value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvDefaults {
    pub api_url: String,
    pub system_prompt: String,
    pub temperature: String,
    pub request_timeout_secs: u64,
}

impl Default for EnvDefaults {
    fn default() -> Self {
        Self::from_env_with(|_| None)
    }
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        Self {
            api_url: non_empty(get_var("QWEN3_API_URL"))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            system_prompt: non_empty(get_var("QWEN3_SYSTEM_PROMPT"))
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: non_empty(get_var("QWEN3_TEMPERATURE"))
                .unwrap_or_else(|| DEFAULT_TEMPERATURE.to_string()),
            request_timeout_secs: parse_request_timeout_secs(
                get_var("QWEN3_TIMEOUT_SECS").as_deref(),
            ),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn parse_request_timeout_secs(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
}

/// The persisted `.qwen3-cli-config.json` document.
///
/// Unknown keys survive a load/save cycle so that a rewrite never drops
/// settings this version does not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub temperature: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "temperature must be a string or number, got {other}"
        ))),
    }
}

impl ConfigDocument {
    pub fn is_empty(&self) -> bool {
        self.api_url.is_none()
            && self.system_prompt.is_none()
            && self.temperature.is_none()
            && self.extra.is_empty()
    }

    pub fn api_url<'a>(&'a self, defaults: &'a EnvDefaults) -> &'a str {
        self.api_url
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(&defaults.api_url)
    }

    pub fn system_prompt<'a>(&'a self, defaults: &'a EnvDefaults) -> &'a str {
        self.system_prompt
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(&defaults.system_prompt)
    }

    /// The raw temperature text, before validation.
    pub fn temperature<'a>(&'a self, defaults: &'a EnvDefaults) -> &'a str {
        self.temperature
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&defaults.temperature)
    }
}
