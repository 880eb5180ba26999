use scalegate_client::ClientError;
use scalegate_common::{ErrorKind, ParseMethodError};
use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias using `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Every failure the proxy facade can report.
///
/// Nothing escapes the facade as a panic; transports render these with
/// [`ProxyError::to_json`].
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No session record exists, or the stored one is unreadable.
    #[error(
        "Error finding a valid session, this usually means a new one needs to be generated."
    )]
    NoSession,

    /// The stored session is past the staleness threshold and the policy rejects it.
    #[error(
        "Session {session_id} is over 12Hrs old ({age_secs} seconds), please generate another one"
    )]
    StaleSession { session_id: String, age_secs: u64 },

    /// The credential provider failed to create a session.
    #[error("Error generating session ID: {0}")]
    GenerationFailed(String),

    /// The credential provider failed to terminate a session.
    #[error("Error killing session: {0}")]
    KillFailed(String),

    /// Upstream call or request validation failure.
    #[error(transparent)]
    Upstream(#[from] ClientError),
}

impl ProxyError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSession => ErrorKind::NoSession,
            Self::StaleSession { .. } => ErrorKind::StaleSession,
            Self::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Self::KillFailed(_) => ErrorKind::KillFailed,
            Self::Upstream(err) => err.kind(),
        }
    }

    /// Structured error value: `{"error": <message>, "kind": <kind>, ...}`.
    ///
    /// Upstream status failures also carry `status` and `body`, stale
    /// sessions carry `session_id` and `age_secs`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        match self {
            Self::Upstream(err @ ClientError::HttpStatus { status, body }) => {
                value["status"] = json!(status);
                value["body"] = json!(body);
                value["session_rejected"] = json!(err.is_session_rejected());
            }
            Self::StaleSession {
                session_id,
                age_secs,
            } => {
                value["session_id"] = json!(session_id);
                value["age_secs"] = json!(age_secs);
            }
            _ => {}
        }

        value
    }
}

impl From<ParseMethodError> for ProxyError {
    fn from(err: ParseMethodError) -> Self {
        Self::Upstream(ClientError::InvalidMethod(err.0))
    }
}
