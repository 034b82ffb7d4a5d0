use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::claude_types::{extract_replies, ClaudeRequest};
use crate::config::{credentials_from_env, ClaudeConfig};
use crate::credentials::{auth_headers, ApplicationDefault, CredentialProvider, StaticToken};
use crate::models::is_known_model;
use crate::provider::ChatProvider;
use crate::sse_stream::SseStream;
use crate::streaming::{drive, StreamInterpreter};
use crate::types::{GenerationRequest, Progress, StreamSummary};
use crate::Error;

/// Result of [`ClaudeVertexClient::get_completion`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The response was streamed through the progress callback.
    Streamed(StreamSummary),
    /// The whole response document of a single-shot call.
    Full(Value),
}

/// Claude client for Vertex AI.
///
/// Holds no per-call state: every call fetches its own token, opens its own
/// connection and runs its own [`StreamInterpreter`], so one client can serve
/// concurrent calls.
pub struct ClaudeVertexClient {
    client: Client,
    config: ClaudeConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl ClaudeVertexClient {
    pub fn new(config: ClaudeConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        if !is_known_model(&config.model) {
            tracing::warn!(model = %config.model, "model not in catalog, using default limits");
        }
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Configuration and credentials from the environment; see
    /// [`ClaudeConfig::from_env`] and [`credentials_from_env`].
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClaudeConfig::from_env(), credentials_from_env())
    }

    /// Authenticate with a pre-issued access token.
    pub fn with_access_token(config: ClaudeConfig, access_token: impl Into<String>) -> Result<Self, Error> {
        Self::new(config, Arc::new(StaticToken::new(access_token)))
    }

    /// Authenticate with Application Default Credentials.
    pub async fn with_adc(config: ClaudeConfig) -> Result<Self, Error> {
        let credentials = ApplicationDefault::new().await?;
        Self::new(config, Arc::new(credentials))
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    /// Stream with any closure as progress callback.
    pub async fn stream_with<F>(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<StreamSummary, Error>
    where
        F: FnMut(Progress) + Send,
    {
        ChatProvider::stream(self, request, cancel, &mut on_progress).await
    }

    /// Single-shot call returning the reply text of every candidate.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, Error> {
        let response = ChatProvider::complete(self, request, cancel).await?;
        extract_replies(&response)
    }

    /// Stream or not, as `request.stream` says.
    pub async fn get_completion<F>(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<Completion, Error>
    where
        F: FnMut(Progress) + Send,
    {
        if request.stream {
            self.stream_with(request, cancel, on_progress)
                .await
                .map(Completion::Streamed)
        } else {
            ChatProvider::complete(self, request, cancel)
                .await
                .map(Completion::Full)
        }
    }

    /// Authenticate and POST `body`, resolving once response headers arrive.
    ///
    /// Token acquisition runs to completion once started; cancellation is
    /// checked before and after it and while the request is in flight.
    async fn send(
        &self,
        body: &ClaudeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }
        let headers = auth_headers(self.credentials.as_ref()).await?;
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let url = self.config.endpoint(body.stream);
        tracing::debug!(%url, ?body, "sending request");

        let request = self.client.post(&url).headers(headers).json(body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = request => response?,
        };

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }

        // The body is only for diagnostics; a failed read still reports the status.
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            text = response.text() => text.ok(),
        };
        tracing::warn!(status = status.as_u16(), body = body.as_deref(), "request rejected");
        Err(Error::api(status.as_u16(), body))
    }

    async fn stream_call(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<StreamSummary, Error> {
        request.validate()?;
        let mut body = ClaudeRequest::build(request, &self.config.model);
        body.stream = true;

        let response = self.send(&body, cancel).await.inspect_err(|error| {
            tracing::debug!(aborted = error.is_aborted(), %error, "stream did not open");
        })?;

        let mut interpreter = StreamInterpreter::new();
        interpreter.opened();

        let events = SseStream::new(response.bytes_stream());
        let summary = drive(interpreter, events, cancel, on_progress).await?;
        tracing::debug!(?summary, "stream completed");
        Ok(summary)
    }

    async fn complete_call(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        request.validate()?;
        let mut body = ClaudeRequest::build(request, &self.config.model);
        body.stream = false;

        let response = self.send(&body, cancel).await?;
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            value = response.json::<Value>() => value?,
        };
        tracing::debug!(response = %value, "received response");
        Ok(value)
    }

    fn call_span(&self, kind: &'static str) -> tracing::Span {
        tracing::info_span!(
            "claude_call",
            call_id = %Uuid::new_v4(),
            kind,
            model = %self.config.model,
        )
    }
}

#[async_trait::async_trait]
impl ChatProvider for ClaudeVertexClient {
    async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<StreamSummary, Error> {
        self.stream_call(request, cancel, on_progress)
            .instrument(self.call_span("stream"))
            .await
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        self.complete_call(request, cancel)
            .instrument(self.call_span("complete"))
            .await
    }
}
