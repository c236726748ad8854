//! Client error types

use labely_common::api::ErrorBody;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        retryable: bool,
    },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Build an API error from a non-2xx response body
    ///
    /// Bodies that are not an error envelope are classified by status alone:
    /// gateway and throttling statuses are worth retrying.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(envelope) => ClientError::Api {
                status,
                code: envelope.code,
                message: envelope.error,
                retryable: envelope.retryable,
            },
            Err(_) => ClientError::Api {
                status,
                code: String::new(),
                message: body.trim().to_string(),
                retryable: matches!(status, 429 | 502 | 503 | 504),
            },
        }
    }

    /// True when resubmitting the same request may succeed; false means
    /// move on to the next item (or stop)
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(e) => !e.is_builder() && !e.is_decode(),
            ClientError::Api { retryable, .. } => *retryable,
            ClientError::Parse(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            ClientError::Parse(_) => None,
        }
    }

    /// Machine-readable code from the error envelope, e.g. `SESSION_TERMINAL`
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } if !code.is_empty() => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_drives_classification() {
        let err = ClientError::from_response(
            409,
            r#"{"error":"Concurrent modification","code":"CONCURRENT_MODIFICATION","retryable":true}"#,
        );
        assert!(err.is_retryable());
        assert_eq!(err.code(), Some("CONCURRENT_MODIFICATION"));

        let err = ClientError::from_response(
            409,
            r#"{"error":"Session closed","code":"SESSION_TERMINAL","retryable":false}"#,
        );
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_plain_text_body_classified_by_status() {
        let err = ClientError::from_response(503, "Service Unavailable");
        assert!(err.is_retryable());
        assert_eq!(err.code(), None);

        let err = ClientError::from_response(400, "Failed to deserialize query string");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_errors_are_terminal() {
        assert!(!ClientError::Parse("bad json".to_string()).is_retryable());
    }
}
