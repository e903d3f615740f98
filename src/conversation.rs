use crate::model::Message;

pub const MAX_CONVERSATION_MESSAGES: usize = 20;

/// Rolling window of recent messages sent as context with each request.
///
/// The cap counts messages, not exchanges. Trimming always drops from the
/// front, so a window that somehow holds an odd number of messages loses the
/// user half of its oldest pair first.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `[system] + snapshot + [user(query)]`; the query is not recorded here.
    pub fn build_request_messages(&self, system_prompt: &str, query: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(&self.messages);
        messages.push(Message::user(query));
        messages
    }

    pub fn append(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(Message::user(query));
        self.messages.push(Message::assistant(answer));
        self.trim();
    }

    fn trim(&mut self) {
        if self.messages.len() <= MAX_CONVERSATION_MESSAGES {
            return;
        }
        let excess = self.messages.len() - MAX_CONVERSATION_MESSAGES;
        self.messages.drain(..excess);
    }
}
