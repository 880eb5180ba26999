//! XDG-compliant path helpers.
//!
//! Respects `XDG_CONFIG_HOME` and `XDG_DATA_HOME`, falling back to
//! `~/.config` and `~/.local/share`.

use std::path::PathBuf;

use crate::error::{DaemonError, Result};

const APP_DIR: &str = "scalegate";

fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
}

fn data_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
}

/// Default configuration file: `$XDG_CONFIG_HOME/scalegate/config.toml`.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn config_file() -> Result<PathBuf> {
    config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .ok_or_else(|| DaemonError::Config("Failed to determine config directory".to_string()))
}

/// Default session record: `$XDG_DATA_HOME/scalegate/session.json`.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn session_file() -> Result<PathBuf> {
    data_dir()
        .map(|dir| dir.join(APP_DIR).join("session.json"))
        .ok_or_else(|| DaemonError::Config("Failed to determine data directory".to_string()))
}
