use serde::Serialize;
use serde_json::Value;

use crate::types::{GenerationRequest, Message};
use crate::Error;

/// Protocol version tag required by Claude on Vertex AI.
pub const ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

/// Claude request body for `rawPredict` / `streamRawPredict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaudeRequest<'a> {
    pub anthropic_version: &'static str,
    pub messages: &'a [Message],
    pub max_tokens: u32,
    pub stream: bool,
    /// Left out entirely when there is no instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
}

impl<'a> ClaudeRequest<'a> {
    /// Wire body for `request` sent to `model`.
    pub fn build(request: &'a GenerationRequest, model: &str) -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION,
            messages: &request.messages,
            max_tokens: request.max_tokens_for(model),
            stream: request.stream,
            system: request.system_instruction(),
        }
    }
}

/// One entry of a batch `outputs` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    pub content: Option<String>,
}

/// Decoded payload of a streamed event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// `{"outputs": [{"content": "..."}, ...]}` with at least one output.
    Batch { outputs: Vec<BatchOutput> },
    /// Any payload carrying a `delta` (e.g. `content_block_delta`, `message_delta`).
    Delta(Value),
    /// Any payload carrying a `content_block` (e.g. `content_block_start`).
    ContentBlock(Value),
    /// Everything else: `message_start`, `message_stop`, ...
    Unrecognized(Value),
}

impl StreamPayload {
    /// Sort a decoded payload into one of the known shapes. Batch outputs win
    /// over `delta`, which wins over `content_block`.
    pub fn classify(value: Value) -> Self {
        let outputs = value
            .get("outputs")
            .and_then(Value::as_array)
            .filter(|outputs| !outputs.is_empty());

        if let Some(outputs) = outputs {
            let outputs = outputs
                .iter()
                .map(|output| BatchOutput {
                    content: output
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect();
            return StreamPayload::Batch { outputs };
        }

        let has = |key: &str| value.get(key).is_some_and(|v| !v.is_null());
        if has("delta") {
            StreamPayload::Delta(value)
        } else if has("content_block") {
            StreamPayload::ContentBlock(value)
        } else {
            StreamPayload::Unrecognized(value)
        }
    }

    /// Content of the first batch output, if it has any text.
    pub fn first_output_text(&self) -> Option<&str> {
        match self {
            StreamPayload::Batch { outputs } => outputs
                .first()
                .and_then(|output| output.content.as_deref())
                .filter(|text| !text.is_empty()),
            _ => None,
        }
    }

    /// The `type` tag of the payload, for logging.
    pub fn type_tag(&self) -> Option<&str> {
        match self {
            StreamPayload::Delta(v) | StreamPayload::ContentBlock(v) | StreamPayload::Unrecognized(v) => {
                v.get("type").and_then(Value::as_str)
            }
            StreamPayload::Batch { .. } => None,
        }
    }
}

/// Pull the reply text out of a single-shot response.
///
/// Reply `i` is `content[0].text` of candidate `i`. Candidates may arrive as a
/// top-level array, nested under `outputs`, or as one message object with a
/// `content` array. Any other shape is a [`Error::ProviderContract`].
pub fn extract_replies(response: &Value) -> Result<Vec<String>, Error> {
    let candidates: &[Value] = match response {
        Value::Array(candidates) => candidates,
        Value::Object(fields) => match fields.get("outputs") {
            Some(Value::Array(candidates)) => candidates,
            Some(_) => {
                return Err(Error::provider_contract("`outputs` is not an array"));
            }
            None if fields.contains_key("content") => std::slice::from_ref(response),
            None => {
                return Err(Error::provider_contract(
                    "response has neither `outputs` nor `content`",
                ));
            }
        },
        other => {
            return Err(Error::provider_contract(format!(
                "expected a list of candidates, got {other}"
            )));
        }
    };

    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            candidate
                .get("content")
                .and_then(Value::as_array)
                .and_then(|content| content.first())
                .and_then(|part| part.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::provider_contract(format!("candidate {index} has no content[0].text"))
                })
        })
        .collect()
}
