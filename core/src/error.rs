//! Error types for the reporting API client.
//!
//! # Design
//! The backend can fail in three ways (transport, non-2xx status, unparseable
//! body) and the dashboard shows all of them the same way: a single message
//! and a retry button. `ApiError::message` is that message. The remaining
//! variants reject bad input before any request leaves the client.

use thiserror::Error;

/// Fallback message when a non-2xx body carries neither `error` nor `message`.
pub const GENERIC_FAILURE: &str = "Request failed";

/// Errors returned by `ApiClient` and the dashboard driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The request never completed (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status. `message` comes from the
    /// body's `error` or `message` field.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not valid JSON, or not the expected shape.
    #[error("invalid response body: {0}")]
    Parse(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// The endpoint is not a relative path under the API base.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A form value was rejected before sending.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A POST was attempted without an anti-forgery token.
    #[error("missing CSRF token")]
    MissingCsrfToken,
}

impl ApiError {
    /// The user-facing message. For `Http` this is exactly what the backend
    /// reported, without the status prefix.
    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_message_is_unprefixed() {
        let err = ApiError::Http {
            status: 400,
            message: "bad input".to_string(),
        };
        assert_eq!(err.message(), "bad input");
        assert_eq!(err.to_string(), "HTTP 400: bad input");
    }

    #[test]
    fn other_messages_use_display() {
        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.message(), "network error: connection refused");
        assert_eq!(ApiError::MissingCsrfToken.message(), "missing CSRF token");
    }

    #[test]
    fn json_errors_become_parse_failures() {
        let err: ApiError = serde_json::from_str::<serde_json::Value>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ApiError::Parse(_)));
    }
}
