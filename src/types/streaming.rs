//! Types for streaming responses.

use serde_json::Value;
use std::fmt;

/// Marker delivered to the progress callback when a stream completes.
pub const DONE_MARKER: &str = "[DONE]";

/// What the progress callback receives while a response streams in.
///
/// A successful stream delivers zero or more `Text`/`Fragment` values followed by
/// exactly one `Done`.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Text taken from a batch `outputs` payload.
    Text(String),
    /// A whole decoded `delta` or `content_block` payload; reassembly is up to the consumer.
    Fragment(Value),
    /// The stream has completed.
    Done,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        matches!(self, Progress::Done)
    }

    /// Text carried directly by this event, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Progress::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Text(text) => f.write_str(text),
            Progress::Fragment(value) => write!(f, "{value}"),
            Progress::Done => f.write_str(DONE_MARKER),
        }
    }
}

/// How a stream reached completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The provider sent the `[DONE]` sentinel.
    Sentinel,
    /// The connection closed without a sentinel.
    Closed,
}

/// Outcome of a completed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub termination: Termination,
    /// Progress values forwarded before `Done`.
    pub fragments: usize,
    /// Payloads that failed to decode as JSON.
    pub malformed: usize,
    /// Payloads that decoded but matched no known shape.
    pub unrecognized: usize,
}
