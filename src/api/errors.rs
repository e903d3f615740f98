use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error as StdError;
use std::io::ErrorKind;
use thiserror::Error;

/// Why a chat request produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Remote { status: u16, message: String },
    /// The request went out but no response came back.
    #[error("Cannot reach the server at '{url}' ({detail}). Check the API URL.")]
    Unreachable { url: String, detail: String },
    /// The request could not be built or sent at all.
    #[error("Request error: {0}")]
    Request(String),
    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn remote(status: StatusCode, body: &str) -> Self {
        Self::Remote {
            status: status.as_u16(),
            message: remote_error_message(status, body),
        }
    }
}

/// Picks the server-provided `error` text out of a failure body, falling back
/// to the status reason phrase.
fn remote_error_message(status: StatusCode, body: &str) -> String {
    let reason = || {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    };

    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return reason();
    };
    match parsed.get("error") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Object(fields)) => match fields.get("message") {
            Some(Value::String(text)) => text.clone(),
            _ => Value::Object(fields.clone()).to_string(),
        },
        Some(Value::Null) | Some(Value::String(_)) | None => reason(),
        Some(other) => other.to_string(),
    }
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("connection refused")
        {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::TimedOut
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("timed out")
        {
            return true;
        }

        current = source.source();
    }

    false
}

/// Maps a transport failure from `reqwest` onto [`ApiError`].
pub(crate) fn classify_send_error(err: reqwest::Error, api_url: &str, timeout_secs: u64) -> ApiError {
    if err.is_builder() {
        return ApiError::Request(format!("invalid request to '{api_url}': {err}"));
    }

    let detail = if err.is_timeout() || error_chain_has_timeout(&err) {
        format!("timed out after {timeout_secs}s")
    } else if error_chain_has_connection_refused(&err) {
        "connection refused".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    };

    ApiError::Unreachable {
        url: api_url.to_string(),
        detail,
    }
}
