use super::message::Message;
use crate::models::model_info;
use crate::Error;

/// A single generation call: conversation turns plus generation options.
///
/// Built once per call and not modified afterwards. Role alternation is the
/// caller's concern; turns are forwarded exactly as given.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// Output token limit. `None` uses the model's `max_response_tokens`.
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl GenerationRequest {
    /// Create a non-streaming request for the given turns.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system: None,
            messages,
            max_tokens: None,
            stream: false,
        }
    }

    /// Set the system instruction.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the output token limit.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request an incrementally streamed response.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The system instruction, if one was given and it is not empty.
    pub fn system_instruction(&self) -> Option<&str> {
        self.system.as_deref().filter(|s| !s.is_empty())
    }

    /// Output token limit when sent to `model`.
    pub fn max_tokens_for(&self, model: &str) -> u32 {
        self.max_tokens
            .unwrap_or_else(|| model_info(model).max_response_tokens)
    }

    /// Check the invariants a real call depends on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.messages.is_empty() {
            return Err(Error::config("a request needs at least one message"));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::config("max_tokens must be greater than zero"));
        }
        Ok(())
    }
}

impl From<Vec<Message>> for GenerationRequest {
    fn from(messages: Vec<Message>) -> Self {
        GenerationRequest::new(messages)
    }
}

impl From<&str> for GenerationRequest {
    fn from(prompt: &str) -> Self {
        GenerationRequest::new(vec![Message::user(prompt)])
    }
}
