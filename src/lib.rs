//! Client for Claude models served by Google Vertex AI.
//!
//! Builds the Vertex request body from a chat history, authenticates every call with a
//! fresh bearer token, and turns either a single JSON response or a live event stream
//! back into reply strings or progress callbacks.

pub mod accumulator;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod provider;
pub mod providers;
pub mod sse_stream;
pub mod streaming;
pub mod types;

// Re-export core types for easy usage
pub use accumulator::ReplyAccumulator;
pub use config::ClaudeConfig;
pub use credentials::{ApplicationDefault, CredentialProvider, GcloudCli, StaticToken};
pub use error::{Error, Result};
pub use provider::ChatProvider;
pub use providers::vertex::{extract_replies, ClaudeVertexClient, Completion};
pub use sse_stream::SseEvent;
pub use streaming::{StreamInterpreter, StreamState};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
