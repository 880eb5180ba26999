//! Error types for the upstream client.

use scalegate_common::ErrorKind;
use thiserror::Error;

/// Errors that can occur when calling the upstream API.
///
/// Every variant maps onto one [`ErrorKind`], so callers can tell a dead
/// network apart from an upstream that rejected the session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Connection, DNS or TLS failure.
    ///
    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream answered with a status outside 2xx.
    #[error("Upstream returned HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body, possibly empty.
        body: String,
    },

    /// No response within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The caller-supplied path failed validation. No request was sent.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The caller-supplied method is not supported.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// A 2xx response whose body is not valid JSON.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid base URL, header or client settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// The flat error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::HttpStatus { .. } => ErrorKind::HttpStatusFailure,
            Self::Timeout => ErrorKind::Timeout,
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::InvalidMethod(_) => ErrorKind::InvalidMethod,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The upstream status code, if the upstream answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the same call could succeed if repeated later.
    ///
    /// Returns `true` for network errors, timeouts and 5xx responses. The
    /// client itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the upstream refused the session credentials (401 or 403).
    ///
    /// Callers typically regenerate the session and retry once.
    #[must_use]
    pub const fn is_session_rejected(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_builder() {
            Self::Configuration(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ClientError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            ClientError::HttpStatus {
                status: 500,
                body: String::new()
            }
            .kind(),
            ErrorKind::HttpStatusFailure
        );
        assert_eq!(
            ClientError::InvalidPath("..".to_string()).kind(),
            ErrorKind::InvalidPath
        );
    }

    #[test]
    fn test_session_rejected() {
        let unauthorized = ClientError::HttpStatus {
            status: 401,
            body: String::new(),
        };
        assert!(unauthorized.is_session_rejected());
        assert!(!unauthorized.is_retryable());

        let server_error = ClientError::HttpStatus {
            status: 503,
            body: String::new(),
        };
        assert!(!server_error.is_session_rejected());
        assert!(server_error.is_retryable());
        assert_eq!(server_error.status(), Some(503));
    }
}
