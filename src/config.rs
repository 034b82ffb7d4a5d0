use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{CredentialProvider, GcloudCli, StaticToken};
use crate::models::DEFAULT_MODEL;

pub const DEFAULT_PROJECT_ID: &str = "argos-434718";
pub const DEFAULT_LOCATION: &str = "us-east5";
pub const DEFAULT_CACHE_NAMESPACE: &str = "claude";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach Claude on Vertex AI.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaudeConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Vertex AI region (e.g. "us-east5", "europe-west1").
    pub location: String,
    /// Vertex model id, e.g. "claude-3-opus@20240229".
    pub model: String,
    /// Cache namespace handed to the surrounding chat framework. Unused by the client itself.
    pub cache_namespace: String,
    /// Replaces `https://{location}-aiplatform.googleapis.com` (used for testing).
    pub base_url: Option<String>,
    /// Bound on establishing the connection. A response in progress is never
    /// timed out here; callers limit a call's duration through its cancellation token.
    pub connect_timeout: Duration,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            base_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClaudeConfig {
    /// Defaults overridden by `GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_REGION`,
    /// `ANTHROPIC_MODEL`, `CLAUDE_CACHE_NAMESPACE` and `VERTEX_BASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`ClaudeConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            project_id: var("GOOGLE_CLOUD_PROJECT").unwrap_or(defaults.project_id),
            location: var("GOOGLE_CLOUD_REGION").unwrap_or(defaults.location),
            model: var("ANTHROPIC_MODEL").unwrap_or(defaults.model),
            cache_namespace: var("CLAUDE_CACHE_NAMESPACE").unwrap_or(defaults.cache_namespace),
            base_url: var("VERTEX_BASE_URL"),
            connect_timeout: defaults.connect_timeout,
        }
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Prediction endpoint for the configured model.
    pub fn endpoint(&self, stream: bool) -> String {
        let method = if stream {
            "streamRawPredict"
        } else {
            "rawPredict"
        };
        let sse_param = if stream { "?alt=sse" } else { "" };

        let host = match &self.base_url {
            Some(base_url) => base_url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };

        format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:{}{}",
            host, self.project_id, self.location, self.model, method, sse_param
        )
    }
}

/// Credential source picked from the environment: `VERTEX_ACCESS_TOKEN` when set,
/// otherwise the `gcloud` CLI.
pub fn credentials_from_env() -> Arc<dyn CredentialProvider> {
    match env::var("VERTEX_ACCESS_TOKEN") {
        Ok(token) if !token.trim().is_empty() => Arc::new(StaticToken::new(token)),
        _ => Arc::new(GcloudCli::new()),
    }
}
