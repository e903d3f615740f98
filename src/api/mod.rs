mod errors;

pub use errors::ApiError;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::Message;
use errors::classify_send_error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<String, ApiError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| ApiError::InvalidResponse(format!("malformed JSON body: {err}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ApiError::InvalidResponse("missing choices[0].message.content".to_string()))
}

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ApiError>> + 'a>>;

/// Transport seam for one chat-completion round trip.
pub trait ChatGateway {
    fn complete<'a>(&'a self, api_url: &'a str, request: &'a ChatCompletionRequest)
    -> ChatFuture<'a>;
}

/// Posts requests over HTTP with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn post(&self, api_url: &str, request: &ChatCompletionRequest) -> Result<String, ApiError> {
        debug!(
            api_url = %api_url,
            message_count = request.messages.len(),
            temperature = request.temperature,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(api_url)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| {
                warn!(api_url = %api_url, error = %err, "chat completion request failed");
                classify_send_error(err, api_url, self.timeout_secs)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::new());
            warn!(
                api_url = %api_url,
                status = %status,
                response_body_len = body.len(),
                "chat completion returned non-success status"
            );
            return Err(ApiError::remote(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|err| classify_send_error(err, api_url, self.timeout_secs))?;
        let content = parse_completion(&body)?;
        debug!(response_len = content.len(), "received chat completion");
        Ok(content)
    }
}

impl ChatGateway for HttpGateway {
    fn complete<'a>(
        &'a self,
        api_url: &'a str,
        request: &'a ChatCompletionRequest,
    ) -> ChatFuture<'a> {
        Box::pin(self.post(api_url, request))
    }
}
