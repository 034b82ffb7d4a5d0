//! Bearer credentials for Vertex AI calls.
//!
//! A token is fetched fresh for every call and dropped once the request headers
//! are built. Nothing here caches or retries.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::fmt;
use std::sync::Arc;
use tokio::process::Command;

use crate::Error;

/// OAuth scope requested for Application Default Credentials.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Content type sent with every request body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A source of short-lived bearer tokens.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain a token for a single call.
    async fn access_token(&self) -> Result<String, Error>;
}

/// Obtain a token and build the `Authorization` and `Content-Type` headers for one call.
pub async fn auth_headers(credentials: &dyn CredentialProvider) -> Result<HeaderMap, Error> {
    let token = credentials.access_token().await?;

    let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::credential("access token is not a valid header value"))?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    Ok(headers)
}

fn non_empty(token: &str) -> Result<String, Error> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::credential("Access token is empty"));
    }
    Ok(token.to_string())
}

/// Tokens printed by the `gcloud` CLI (`gcloud auth print-access-token`).
///
/// Every call spawns the command once and waits for it to exit. Anything written
/// to stderr is treated as a failure.
#[derive(Debug, Clone)]
pub struct GcloudCli {
    program: String,
    args: Vec<String>,
}

impl GcloudCli {
    pub fn new() -> Self {
        Self::with_command("gcloud", ["auth", "print-access-token"])
    }

    /// Use a different command to print the token.
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for GcloudCli {
    async fn access_token(&self) -> Result<String, Error> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::credential(format!("failed to run {}: {e}", self.program)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if !output.status.success() {
            tracing::error!(program = %self.program, status = %output.status, stderr, "token command failed");
            return Err(Error::credential(format!(
                "{} exited with {}: {stderr}",
                self.program, output.status
            )));
        }
        if !stderr.is_empty() {
            tracing::error!(program = %self.program, stderr, "token command reported an error");
            return Err(Error::credential(format!(
                "Failed to get access token: {stderr}"
            )));
        }

        non_empty(&String::from_utf8_lossy(&output.stdout))
    }
}

/// A token issued ahead of time, e.g. from `VERTEX_ACCESS_TOKEN`.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, Error> {
        non_empty(&self.0)
    }
}

/// Application Default Credentials through `gcp_auth`.
#[derive(Clone)]
pub struct ApplicationDefault {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl ApplicationDefault {
    /// Discover credentials from the environment (service account file,
    /// metadata server, or local `gcloud` configuration).
    pub async fn new() -> Result<Self, Error> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            Error::credential(format!("Failed to create auth manager: {e}"))
        })?;
        Ok(Self { provider })
    }

    pub fn from_provider(provider: Arc<dyn gcp_auth::TokenProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ApplicationDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationDefault").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for ApplicationDefault {
    async fn access_token(&self) -> Result<String, Error> {
        let token = self
            .provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| Error::credential(format!("Failed to get ADC token: {e}")))?;
        non_empty(token.as_str())
    }
}
