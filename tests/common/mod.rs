#![allow(dead_code)]

use claude_vertex::{ClaudeConfig, ClaudeVertexClient, CredentialProvider, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "test-access-token";

pub const STREAM_PATH: &str = "/v1/projects/test-project/locations/us-east5/publishers/anthropic/models/claude-3-opus@20240229:streamRawPredict";
pub const RAW_PATH: &str = "/v1/projects/test-project/locations/us-east5/publishers/anthropic/models/claude-3-opus@20240229:rawPredict";

pub fn test_config(server: &MockServer) -> ClaudeConfig {
    ClaudeConfig::default()
        .project_id("test-project")
        .base_url(server.uri())
}

/// Client authenticated with [`ACCESS_TOKEN`] pointed at the mock server.
pub fn create_client(server: &MockServer) -> ClaudeVertexClient {
    ClaudeVertexClient::with_access_token(test_config(server), ACCESS_TOKEN)
        .expect("Failed to create client")
}

/// Hands out `token-1`, `token-2`, ... and counts how often it was asked.
#[derive(Debug, Default)]
pub struct CountingTokens {
    issued: AtomicUsize,
}

impl CountingTokens {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialProvider for CountingTokens {
    async fn access_token(&self) -> Result<String, Error> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }
}

pub fn counting_client(server: &MockServer) -> (ClaudeVertexClient, Arc<CountingTokens>) {
    let tokens = Arc::new(CountingTokens::default());
    let client = ClaudeVertexClient::new(test_config(server), tokens.clone())
        .expect("Failed to create client");
    (client, tokens)
}
