//! # scalegate-daemon
//!
//! Process-level wiring for scalegate: configuration, the HTTP gateway and
//! the `scalegate` binary.
//!
//! - [`config`]: TOML configuration with defaults and validation
//! - [`app`]: builds a [`ScaleProxy`](scalegate::ScaleProxy) from configuration
//! - [`server`]: axum router with bearer authentication
//!
//! The stdio transport lives in `scalegate-tools`; the binary picks one of
//! the two per invocation.

pub mod app;
pub mod config;
pub mod error;
pub mod paths;
pub mod server;

pub use app::build_proxy;
pub use config::GatewayConfig;
pub use error::{DaemonError, Result};
