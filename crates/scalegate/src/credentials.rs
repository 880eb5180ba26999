//! Credential acquisition and revocation.
//!
//! The session manager never performs a login itself. It asks a
//! [`CredentialProvider`] for fresh credentials and tells it which session to
//! revoke. Two providers ship with the crate:
//!
//! - [`CommandProvider`]: runs external programs, one to log in and one to log out
//! - [`LoginProvider`]: logs in over HTTP against the upstream's `/login` and `/logout`

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use scalegate_client::{ClientError, UpstreamClient};
use scalegate_common::{COOKIE_HEADER, HttpMethod, SESSION_COOKIE, cookie_session_id};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;

/// Default time allowed for an external credential program.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a credential provider.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The external program could not be started.
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The external program exited unsuccessfully.
    #[error("Command exited with status {}: {stderr}", .status.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// Exit code, `None` if killed by a signal.
        status: Option<i32>,
        stderr: String,
    },

    /// The external program did not finish in time.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The provider produced credentials without a `sessionID` cookie.
    #[error("Credentials did not contain a session ID")]
    MissingSessionId,

    /// Login or logout call to the upstream failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] ClientError),

    /// The provider is misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Headers that authenticate upstream calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub headers: BTreeMap<String, String>,
}

impl Credentials {
    /// Credentials consisting of `Cookie: sessionID=<id>`.
    #[must_use]
    pub fn from_session_id(session_id: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            COOKIE_HEADER.to_string(),
            format!("{SESSION_COOKIE}={session_id}"),
        );
        Self { headers }
    }

    /// The session identifier carried in the cookie header.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(COOKIE_HEADER))
            .and_then(|(_, value)| cookie_session_id(value))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Source of session credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Performs a login and returns the resulting credential headers.
    async fn acquire(&self) -> Result<Credentials, CredentialError>;

    /// Terminates the session identified by `session_id`.
    async fn revoke(&self, session_id: &str) -> Result<(), CredentialError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Runs external programs to create and destroy sessions.
///
/// The acquire program prints the session on stdout, either as a bare id, as a
/// `sessionID=<id>` cookie string, or as a JSON object of headers. The revoke
/// program receives the session id as its final argument.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    acquire: Vec<String>,
    revoke: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    /// Creates a provider from two argv vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if either command is empty.
    pub fn new(acquire: Vec<String>, revoke: Vec<String>) -> Result<Self, CredentialError> {
        if acquire.is_empty() || revoke.is_empty() {
            return Err(CredentialError::Configuration(
                "acquire and revoke commands must not be empty".to_string(),
            ));
        }

        Ok(Self {
            acquire,
            revoke,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, argv: &[String], extra_arg: Option<&str>) -> Result<String, CredentialError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            CredentialError::Configuration("command must not be empty".to_string())
        })?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(arg) = extra_arg {
            cmd.arg(arg);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CredentialError::Timeout(self.timeout))?
            .map_err(|e| CredentialError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CredentialError::CommandFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Interprets the acquire program's stdout.
///
/// Session ids are opaque and may contain `=` (base64 padding). A line is read
/// as a cookie string only when it carries a `sessionID` pair; a `;`-separated
/// cookie string without one is rejected.
fn parse_acquire_output(stdout: &str) -> Result<Credentials, CredentialError> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(map)) => {
            let headers = map
                .into_iter()
                .map(|(name, value)| match value {
                    Value::String(value) => Ok((name, value)),
                    _ => Err(CredentialError::MissingSessionId),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            let credentials = Credentials { headers };
            return credentials
                .session_id()
                .is_some()
                .then_some(credentials)
                .ok_or(CredentialError::MissingSessionId);
        }
        Ok(Value::String(id)) => {
            let id = id.trim();
            if id.is_empty() {
                return Err(CredentialError::MissingSessionId);
            }
            return Ok(Credentials::from_session_id(id));
        }
        _ => {}
    }

    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(CredentialError::MissingSessionId)?;

    let session_id = match cookie_session_id(line) {
        Some(id) => id,
        None if line.contains(';') => return Err(CredentialError::MissingSessionId),
        None => line,
    };

    Ok(Credentials::from_session_id(session_id))
}

#[async_trait]
impl CredentialProvider for CommandProvider {
    async fn acquire(&self) -> Result<Credentials, CredentialError> {
        let stdout = self.run(&self.acquire, None).await?;
        parse_acquire_output(&stdout)
    }

    async fn revoke(&self, session_id: &str) -> Result<(), CredentialError> {
        self.run(&self.revoke, Some(session_id)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Logs in over HTTP with a username and password.
///
/// `POST /login {"username", "password", "useOIDC": false}` answers with
/// `{"sessionID": "..."}`; `POST /logout` with the session cookie ends it.
#[derive(Clone)]
pub struct LoginProvider {
    client: UpstreamClient,
    username: String,
    password: SecretString,
}

impl LoginProvider {
    #[must_use]
    pub const fn new(client: UpstreamClient, username: String, password: SecretString) -> Self {
        Self {
            client,
            username,
            password,
        }
    }
}

#[async_trait]
impl CredentialProvider for LoginProvider {
    async fn acquire(&self) -> Result<Credentials, CredentialError> {
        let body = json!({
            "username": self.username,
            "password": self.password.expose_secret(),
            "useOIDC": false,
        });

        let response = self
            .client
            .request(HttpMethod::Post, "/login", &BTreeMap::new(), Some(&body), None)
            .await?;

        let session_id = response
            .get(SESSION_COOKIE)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(CredentialError::MissingSessionId)?;

        Ok(Credentials::from_session_id(session_id))
    }

    async fn revoke(&self, session_id: &str) -> Result<(), CredentialError> {
        let credentials = Credentials::from_session_id(session_id);
        self.client
            .request(HttpMethod::Post, "/logout", &credentials.headers, None, None)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "login"
    }
}

impl std::fmt::Debug for LoginProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginProvider")
            .field("base_url", &self.client.base_url().as_str())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use scalegate_client::UpstreamConfig;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_bare_id() {
        let creds = parse_acquire_output("abc123").unwrap();
        assert_eq!(creds.session_id(), Some("abc123"));
    }

    #[test]
    fn test_parse_bare_id_with_padding() {
        let creds = parse_acquire_output("c2Vzc2lvbg==\n").unwrap();
        assert_eq!(creds.session_id(), Some("c2Vzc2lvbg=="));
        assert_eq!(creds.headers.get("Cookie").unwrap(), "sessionID=c2Vzc2lvbg==");
    }

    #[test]
    fn test_parse_json_string_id() {
        let creds = parse_acquire_output(r#""abc""#).unwrap();
        assert_eq!(creds.session_id(), Some("abc"));

        assert!(matches!(
            parse_acquire_output(r#""""#),
            Err(CredentialError::MissingSessionId)
        ));
    }

    #[test]
    fn test_parse_uses_last_line() {
        let creds = parse_acquire_output("logging in...\n\nabc123\n").unwrap();
        assert_eq!(creds.session_id(), Some("abc123"));
    }

    #[test]
    fn test_parse_cookie_string() {
        let creds = parse_acquire_output("sessionID=xyz").unwrap();
        assert_eq!(creds.session_id(), Some("xyz"));
        assert_eq!(creds.headers.get("Cookie").unwrap(), "sessionID=xyz");
    }

    #[test]
    fn test_parse_json_headers() {
        let creds =
            parse_acquire_output(r#"{"Cookie": "sessionID=j1", "X-Extra": "1"}"#).unwrap();
        assert_eq!(creds.session_id(), Some("j1"));
        assert_eq!(creds.headers.len(), 2);
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        assert!(matches!(
            parse_acquire_output(""),
            Err(CredentialError::MissingSessionId)
        ));
        assert!(matches!(
            parse_acquire_output("other=1; path=/"),
            Err(CredentialError::MissingSessionId)
        ));
        assert!(matches!(
            parse_acquire_output(r#"{"X-Extra": "1"}"#),
            Err(CredentialError::MissingSessionId)
        ));
    }

    #[test]
    fn test_command_provider_rejects_empty_commands() {
        assert!(CommandProvider::new(vec![], argv(&["true"])).is_err());
        assert!(CommandProvider::new(argv(&["true"]), vec![]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_acquire() {
        let provider =
            CommandProvider::new(argv(&["sh", "-c", "echo S1"]), argv(&["true"])).unwrap();
        let creds = provider.acquire().await.unwrap();
        assert_eq!(creds.session_id(), Some("S1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_failure_carries_stderr() {
        let provider = CommandProvider::new(
            argv(&["sh", "-c", "echo 'login refused' >&2; exit 3"]),
            argv(&["true"]),
        )
        .unwrap();

        let err = provider.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::CommandFailed { status: Some(3), ref stderr } if stderr == "login refused"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_revoke_receives_id() {
        // `sh -c script arg` binds the appended id to $0
        let provider = CommandProvider::new(
            argv(&["true"]),
            argv(&["sh", "-c", "[ \"$0\" = S1 ]"]),
        )
        .unwrap();

        provider.revoke("S1").await.unwrap();
        assert!(provider.revoke("S2").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_timeout() {
        let provider = CommandProvider::new(argv(&["sleep", "5"]), argv(&["true"]))
            .unwrap()
            .with_timeout(Duration::from_millis(100));

        assert!(matches!(
            provider.acquire().await,
            Err(CredentialError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_command_provider_missing_program() {
        let provider = CommandProvider::new(
            argv(&["/nonexistent/scalegate-login"]),
            argv(&["true"]),
        )
        .unwrap();

        assert!(matches!(
            provider.acquire().await,
            Err(CredentialError::Spawn { .. })
        ));
    }

    fn login_provider(server: &MockServer) -> LoginProvider {
        let config = UpstreamConfig::new(&format!("{}/rest/v1", server.uri())).unwrap();
        LoginProvider::new(
            UpstreamClient::new(config).unwrap(),
            "admin".to_string(),
            SecretString::new("hunter2".to_string().into()),
        )
    }

    #[tokio::test]
    async fn test_login_provider_acquire() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/login"))
            .and(body_json(json!({
                "username": "admin",
                "password": "hunter2",
                "useOIDC": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionID": "L1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let creds = login_provider(&mock_server).acquire().await.unwrap();
        assert_eq!(creds.session_id(), Some("L1"));
    }

    #[tokio::test]
    async fn test_login_provider_rejected_login() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&mock_server)
            .await;

        let err = login_provider(&mock_server).acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Upstream(ClientError::HttpStatus { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_login_provider_revoke_sends_cookie() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/logout"))
            .and(header("cookie", "sessionID=L1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        login_provider(&mock_server).revoke("L1").await.unwrap();
    }

    #[test]
    fn test_login_provider_debug_redacts_password() {
        let config = UpstreamConfig::new("https://scale.local/rest/v1").unwrap();
        let provider = LoginProvider::new(
            UpstreamClient::new(config).unwrap(),
            "admin".to_string(),
            SecretString::new("hunter2".to_string().into()),
        );
        let debug_str = format!("{provider:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("hunter2"));
    }
}
