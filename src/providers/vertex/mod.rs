pub mod claude;
pub mod claude_types;

pub use claude::{ClaudeVertexClient, Completion};
pub use claude_types::{extract_replies, ClaudeRequest, StreamPayload, ANTHROPIC_VERSION};
