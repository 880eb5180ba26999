//! # scalegate-client
//!
//! Hardened HTTP client for the single upstream REST API scalegate fronts.
//!
//! - [`UpstreamClient`]: sends requests to a fixed base URL with caller-supplied
//!   credential headers and a fixed `User-Agent`
//! - [`ClientError`]: uniform classification of network, timeout and status failures
//! - [`target`]: URL construction that keeps untrusted paths under the base URL
//!
//! The client never retries. A single failure surfaces immediately so the
//! caller can decide whether to regenerate the session first.
//!
//! ## Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use scalegate_client::{UpstreamClient, UpstreamConfig};
//! use scalegate_common::HttpMethod;
//!
//! # async fn example() -> Result<(), scalegate_client::ClientError> {
//! let client = UpstreamClient::new(UpstreamConfig::new("https://scale.local/rest/v1")?)?;
//!
//! let mut headers = BTreeMap::new();
//! headers.insert("Cookie".to_string(), "sessionID=abc".to_string());
//!
//! let nodes = client
//!     .request(HttpMethod::Get, "/Node", &headers, None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod target;

pub use client::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, UpstreamClient, UpstreamConfig};
pub use error::ClientError;
