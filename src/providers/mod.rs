//! Provider implementations.

pub mod vertex;

pub use vertex::ClaudeVertexClient;
