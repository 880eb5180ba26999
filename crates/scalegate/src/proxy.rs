//! The five operations every transport exposes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use scalegate_client::UpstreamClient;
use scalegate_common::{HttpMethod, ProxyRequest, SessionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ProxyError, Result};
use crate::manager::SessionManager;

/// What to do when a forwarded call finds a stale session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Forward anyway and log a warning.
    #[default]
    Warn,
    /// Refuse with [`ProxyError::StaleSession`].
    Reject,
}

/// Result of a successful `generate_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionGenerated {
    pub session_id: String,
}

impl fmt::Display for SessionGenerated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generated Session: {}", self.session_id)
    }
}

/// Result of a successful `kill_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionKilled {
    pub session_id: String,
}

impl fmt::Display for SessionKilled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session {} killed successfully.", self.session_id)
    }
}

/// Response body for session operations: `{"message": ..., "session_id": ...}`.
#[must_use]
pub fn session_message(message: &impl fmt::Display, session_id: &str) -> Value {
    json!({
        "message": message.to_string(),
        "session_id": session_id,
    })
}

/// Response body for `get_session`, including status and age.
#[must_use]
pub fn status_message(status: &SessionStatus) -> Value {
    let mut value = json!(status);
    value["message"] = json!(status.to_string());
    value
}

/// Facade over the session manager and the upstream client.
///
/// Every public operation returns a `Result`; transports turn the error side
/// into data with [`ProxyError::to_json`].
#[derive(Debug, Clone)]
pub struct ScaleProxy {
    sessions: Arc<SessionManager>,
    client: UpstreamClient,
    stale_policy: StalePolicy,
}

impl ScaleProxy {
    #[must_use]
    pub const fn new(sessions: Arc<SessionManager>, client: UpstreamClient) -> Self {
        Self {
            sessions,
            client,
            stale_policy: StalePolicy::Warn,
        }
    }

    #[must_use]
    pub const fn with_stale_policy(mut self, stale_policy: StalePolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Forwards one request using the stored session's headers.
    ///
    /// The record is copied before the upstream call, so a concurrent
    /// rotation neither blocks on nor alters an in-flight request.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::NoSession`] if nothing is stored (no request is sent)
    /// - [`ProxyError::StaleSession`] under [`StalePolicy::Reject`]
    /// - [`ProxyError::Upstream`] for any client failure
    pub async fn forward(&self, request: &ProxyRequest) -> Result<Value> {
        let (record, status) = self.sessions.snapshot().await?;

        if let SessionStatus::Stale {
            session_id,
            age_secs,
        } = status
        {
            match self.stale_policy {
                StalePolicy::Reject => {
                    return Err(ProxyError::StaleSession {
                        session_id,
                        age_secs,
                    });
                }
                StalePolicy::Warn => {
                    log::warn!(
                        "Forwarding {} {} with a session {age_secs}s old",
                        request.method,
                        request.path
                    );
                }
            }
        }

        let result = self.client.send(request, &record.headers).await;
        if let Err(e) = &result
            && e.is_session_rejected()
        {
            log::warn!("Upstream rejected the stored session; generate a new one");
        }

        Ok(result?)
    }

    /// Forwards `method path` with an optional JSON body and query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] with `InvalidMethod` for methods other
    /// than GET, POST, PUT and DELETE, plus everything [`Self::forward`] returns.
    pub async fn run_api(
        &self,
        path: &str,
        method: &str,
        payload: Option<Value>,
        query: Option<BTreeMap<String, String>>,
    ) -> Result<Value> {
        let method: HttpMethod = method.parse()?;
        let request = ProxyRequest {
            path: path.to_string(),
            method,
            payload,
            query,
        };
        self.forward(&request).await
    }

    /// Forwards a GET without body.
    ///
    /// # Errors
    ///
    /// See [`Self::forward`].
    pub async fn query_api(&self, path: &str) -> Result<Value> {
        let request = ProxyRequest::builder()
            .path(path)
            .method(HttpMethod::Get)
            .build();
        self.forward(&request).await
    }

    /// # Errors
    ///
    /// Returns [`ProxyError::GenerationFailed`] if no session could be created.
    pub async fn generate_session(&self) -> Result<SessionGenerated> {
        let session_id = self.sessions.generate_session().await?;
        Ok(SessionGenerated { session_id })
    }

    /// # Errors
    ///
    /// Returns [`ProxyError::NoSession`] if nothing is stored.
    pub async fn get_session(&self) -> Result<SessionStatus> {
        self.sessions.get_session().await
    }

    /// Kills `session_id`, or the stored session when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::NoSession`] or [`ProxyError::KillFailed`].
    pub async fn kill_session(&self, session_id: Option<&str>) -> Result<SessionKilled> {
        let session_id = self.sessions.kill_session(session_id).await?;
        Ok(SessionKilled { session_id })
    }
}
