//! Gateway configuration.
//!
//! Configuration is loaded from `~/.config/scalegate/config.toml` unless a
//! path is given on the command line.
//!
//! ## Example Configuration
//!
//! ```toml
//! [upstream]
//! base_url = "https://172.18.33.216/rest/v1"
//! timeout_secs = 30
//! insecure_skip_tls_verify = false
//!
//! [session]
//! store = "file"
//! stale_after_secs = 43200
//! stale_policy = "warn"
//!
//! [credentials]
//! provider = "command"
//! acquire = ["python", "/opt/scale/gen_sessionID.py"]
//! revoke = ["python", "/opt/scale/kill_sessionID.py"]
//!
//! [server]
//! bind = "127.0.0.1:5085"
//! bearer_token_env = "SCALEGATE_BEARER_TOKEN"
//! ```
//!
//! Secrets never live in the file itself. The `*_env` keys name the
//! environment variable that holds them.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use scalegate::StalePolicy;
use scalegate_common::DEFAULT_STALE_AFTER_SECS;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};
use crate::paths;

/// Gateway configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// The upstream REST API
    pub upstream: UpstreamSettings,

    /// Session record storage and freshness
    #[serde(default)]
    pub session: SessionSettings,

    /// How sessions are created and destroyed
    pub credentials: CredentialSettings,

    /// HTTP listener
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL every request path is joined onto
    pub base_url: String,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accept any TLS certificate (default: false)
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// `User-Agent` override
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Where the session record is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub store: StoreKind,

    /// Record location for the file store (default: `$XDG_DATA_HOME/scalegate/session.json`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Age at which a session is reported stale (default: 43200 = 12 hours)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default)]
    pub stale_policy: StalePolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            path: None,
            stale_after_secs: default_stale_after_secs(),
            stale_policy: StalePolicy::default(),
        }
    }
}

/// Credential provider selection, tagged by `provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum CredentialSettings {
    /// External login/logout programs
    Command {
        /// argv of the program that prints a new session
        acquire: Vec<String>,
        /// argv of the program that ends a session; the id is appended
        revoke: Vec<String>,
        /// Time allowed per program run in seconds (default: 30)
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Username/password login against the upstream
    Login {
        username: String,
        /// Environment variable holding the password
        password_env: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address (default: 127.0.0.1:5085)
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Environment variable holding the inbound bearer token
    #[serde(default = "default_bearer_token_env")]
    pub bearer_token_env: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            bearer_token_env: default_bearer_token_env(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_stale_after_secs() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}

const fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5085)
}

fn default_bearer_token_env() -> String {
    "SCALEGATE_BEARER_TOKEN".to_string()
}

impl GatewayConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file doesn't exist
    /// - Deserialization or validation fails
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            return Err(DaemonError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| DaemonError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization or validation fails.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        paths::config_file()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The base URL is not an http(s) URL with a host
    /// - A timeout or the staleness threshold is zero
    /// - A command provider has an empty `acquire` or `revoke`
    /// - A login provider has an empty `username` or `password_env`
    pub fn validate(&self) -> Result<()> {
        scalegate_client::target::parse_base_url(&self.upstream.base_url)?;

        if self.upstream.timeout_secs == 0 {
            return Err(DaemonError::Config(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.session.stale_after_secs == 0 {
            return Err(DaemonError::Config(
                "session.stale_after_secs must be greater than zero".to_string(),
            ));
        }

        match &self.credentials {
            CredentialSettings::Command {
                acquire,
                revoke,
                timeout_secs,
            } => {
                if acquire.is_empty() || revoke.is_empty() {
                    return Err(DaemonError::Config(
                        "credentials.acquire and credentials.revoke must not be empty".to_string(),
                    ));
                }
                if *timeout_secs == 0 {
                    return Err(DaemonError::Config(
                        "credentials.timeout_secs must be greater than zero".to_string(),
                    ));
                }
            }
            CredentialSettings::Login {
                username,
                password_env,
            } => {
                if username.trim().is_empty() || password_env.trim().is_empty() {
                    return Err(DaemonError::Config(
                        "credentials.username and credentials.password_env are required"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Reads the inbound bearer token from the configured variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn bearer_token(&self) -> Result<SecretString> {
        secret_from_env(&self.server.bearer_token_env)
    }
}

/// Reads a secret from the environment variable `var`.
///
/// # Errors
///
/// Returns an error if the variable is unset or empty.
pub fn secret_from_env(var: &str) -> Result<SecretString> {
    secret_from(var, |name| std::env::var(name).ok())
}

fn secret_from(var: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<SecretString> {
    lookup(var)
        .filter(|value| !value.trim().is_empty())
        .map(|value| SecretString::new(value.into()))
        .ok_or_else(|| {
            DaemonError::Config(format!("Environment variable {var} is not set or empty"))
        })
}
