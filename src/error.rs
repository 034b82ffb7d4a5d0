use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling Claude through Vertex AI.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to obtain access token: {0}")]
    Credential(String),

    /// The endpoint answered with a non-200 status, either when opening a stream
    /// or for a single-shot call.
    #[error("Failed to send message. HTTP {status}{}", .body.as_deref().map(|b| format!(" - {b}")).unwrap_or_default())]
    Api {
        status: u16,
        /// The error body, when it parsed as JSON.
        json: Option<Value>,
        /// The raw error body, as far as it could be read.
        body: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Request aborted")]
    Aborted,

    #[error("Unexpected response shape from provider: {0}")]
    ProviderContract(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn credential(message: impl Into<String>) -> Self {
        Error::Credential(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn provider_contract(message: impl Into<String>) -> Self {
        Error::ProviderContract(message.into())
    }

    /// Build an [`Error::Api`] from a failed response body. The body is kept
    /// as JSON when it parses and as raw text otherwise.
    pub fn api(status: u16, body: Option<String>) -> Self {
        let json = body
            .as_deref()
            .and_then(|text| serde_json::from_str::<Value>(text).ok());
        Error::Api { status, json, body }
    }

    /// HTTP status carried by the error, if it came from the endpoint.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Parsed JSON error body, if any.
    pub fn json(&self) -> Option<&Value> {
        match self {
            Error::Api { json, .. } => json.as_ref(),
            _ => None,
        }
    }

    /// Raw error body, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Api { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Whether the call was cancelled by the caller rather than failing.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_keeps_parsed_body() {
        let error = Error::api(403, Some(r#"{"error":"forbidden"}"#.to_string()));
        assert_eq!(error.status(), Some(403));
        assert_eq!(error.json(), Some(&json!({"error": "forbidden"})));
        assert_eq!(error.body(), Some(r#"{"error":"forbidden"}"#));
        assert_eq!(
            error.to_string(),
            r#"Failed to send message. HTTP 403 - {"error":"forbidden"}"#
        );
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        let error = Error::api(502, Some("<html>Bad Gateway</html>".to_string()));
        assert_eq!(error.status(), Some(502));
        assert!(error.json().is_none());
        assert_eq!(error.body(), Some("<html>Bad Gateway</html>"));
    }

    #[test]
    fn test_api_error_without_body() {
        let error = Error::api(500, None);
        assert_eq!(error.to_string(), "Failed to send message. HTTP 500");
    }

    #[test]
    fn test_aborted_is_distinguishable() {
        assert!(Error::Aborted.is_aborted());
        assert!(!Error::streaming("connection reset").is_aborted());
        assert!(!Error::credential("empty").is_aborted());
    }
}
