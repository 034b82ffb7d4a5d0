//! Reassembly of streamed progress into the reply text.

use serde_json::Value;

use crate::types::Progress;

/// Collects the text carried by progress values into one reply.
///
/// Understands batch text, `text_delta` deltas, text `content_block`s and the
/// `stop_reason` of a message delta. Other fragments are ignored.
#[derive(Debug, Default, Clone)]
pub struct ReplyAccumulator {
    text: String,
    stop_reason: Option<String>,
    finished: bool,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a progress value and update the reply.
    pub fn push(&mut self, progress: &Progress) {
        match progress {
            Progress::Text(text) => self.text.push_str(text),
            Progress::Fragment(value) => self.push_fragment(value),
            Progress::Done => self.finished = true,
        }
    }

    fn push_fragment(&mut self, value: &Value) {
        if let Some(delta) = value.get("delta").filter(|d| !d.is_null()) {
            if delta.get("type").and_then(Value::as_str) == Some("text_delta") {
                if let Some(text) = delta.get("text").and_then(Value::as_str) {
                    self.text.push_str(text);
                }
            }
            if let Some(reason) = delta.get("stop_reason").and_then(Value::as_str) {
                self.stop_reason = Some(reason.to_string());
            }
            return;
        }

        if let Some(block) = value.get("content_block") {
            if block.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    self.text.push_str(text);
                }
            }
        }
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stop reason reported by the provider, if any.
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Whether `Done` has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Extend<Progress> for ReplyAccumulator {
    fn extend<I: IntoIterator<Item = Progress>>(&mut self, iter: I) {
        for progress in iter {
            self.push(&progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_text_accumulation() {
        let mut accumulator = ReplyAccumulator::new();
        accumulator.extend([
            Progress::Text("Hel".into()),
            Progress::Text("lo".into()),
            Progress::Done,
        ]);
        assert_eq!(accumulator.text(), "Hello");
        assert!(accumulator.is_finished());
    }

    #[test]
    fn test_message_event_accumulation() {
        let mut accumulator = ReplyAccumulator::new();
        accumulator.extend([
            Progress::Fragment(json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
            Progress::Fragment(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}})),
            Progress::Fragment(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " there!"}})),
            Progress::Fragment(json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"a\""}})),
            Progress::Fragment(json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 3}})),
        ]);
        assert_eq!(accumulator.text(), "Hi there!");
        assert_eq!(accumulator.stop_reason(), Some("end_turn"));
        assert!(!accumulator.is_finished());

        accumulator.push(&Progress::Done);
        assert_eq!(accumulator.into_text(), "Hi there!");
    }

    #[test]
    fn test_initial_block_text_is_kept() {
        let mut accumulator = ReplyAccumulator::new();
        accumulator.push(&Progress::Fragment(
            json!({"type": "content_block_start", "content_block": {"type": "text", "text": "Start"}}),
        ));
        accumulator.push(&Progress::Fragment(
            json!({"type": "content_block_start", "content_block": {"type": "tool_use", "id": "toolu_1"}}),
        ));
        assert_eq!(accumulator.text(), "Start");
    }
}
