use tracing::debug;

use crate::api::{ApiError, ChatCompletionRequest, ChatGateway};
use crate::conversation::Conversation;
use crate::model::Message;

/// Sends queries with the rolling conversation as context.
///
/// The window only grows after a request fully succeeds; a failed call
/// leaves it exactly as it was.
pub struct ChatClient<G> {
    gateway: G,
    api_url: String,
    conversation: Conversation,
}

impl<G: ChatGateway> ChatClient<G> {
    pub fn new(gateway: G, api_url: impl Into<String>) -> Self {
        Self {
            gateway,
            api_url: api_url.into(),
            conversation: Conversation::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn set_api_url(&mut self, api_url: impl Into<String>) {
        self.api_url = api_url.into();
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.snapshot()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn send(
        &mut self,
        query: &str,
        system_prompt: &str,
        temperature: f64,
    ) -> Result<String, ApiError> {
        let request = ChatCompletionRequest {
            messages: self.conversation.build_request_messages(system_prompt, query),
            temperature,
        };

        let answer = self.gateway.complete(&self.api_url, &request).await?;

        self.conversation.append(query, answer.clone());
        debug!(
            context_messages = self.conversation.len(),
            "recorded exchange in conversation window"
        );
        Ok(answer)
    }
}
