use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat classification of every failure a caller can observe.
///
/// Transports report this alongside the error message so callers can decide
/// whether to regenerate the session and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// No session record exists, or it is unreadable.
    NoSession,
    /// A session exists but is past the staleness threshold.
    StaleSession,
    /// The credential provider could not create a session.
    GenerationFailed,
    /// The credential provider could not terminate a session.
    KillFailed,
    /// Connection, DNS or TLS failure reaching the upstream.
    NetworkFailure,
    /// The upstream answered with a non-2xx status.
    HttpStatusFailure,
    /// The upstream did not answer within the request timeout.
    Timeout,
    /// The caller-supplied path was rejected before any network I/O.
    InvalidPath,
    /// The caller-supplied method is not supported.
    InvalidMethod,
    /// The upstream answered 2xx with a body that is not JSON.
    InvalidResponse,
    /// The inbound request body could not be decoded.
    InvalidRequest,
    /// Inbound bearer token mismatch.
    Unauthorized,
    /// Misconfiguration detected at call time.
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::StaleSession => "stale_session",
            Self::GenerationFailed => "generation_failed",
            Self::KillFailed => "kill_failed",
            Self::NetworkFailure => "network_failure",
            Self::HttpStatusFailure => "http_status_failure",
            Self::Timeout => "timeout",
            Self::InvalidPath => "invalid_path",
            Self::InvalidMethod => "invalid_method",
            Self::InvalidResponse => "invalid_response",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_serde_matches_as_str() {
        for kind in [
            ErrorKind::NoSession,
            ErrorKind::HttpStatusFailure,
            ErrorKind::Timeout,
            ErrorKind::InvalidPath,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }
}
