//! Error types for the scalegate daemon.

use scalegate::{CredentialError, StoreError};
use scalegate_client::ClientError;
use thiserror::Error;

/// Errors that can occur while starting or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O error (config file, listener socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Session store could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Credential provider could not be built.
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `DaemonError`.
pub type Result<T> = std::result::Result<T, DaemonError>;
