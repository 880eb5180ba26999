//! # scalegate-common
//!
//! Shared data types for the scalegate proxy.
//!
//! This crate holds the values that cross crate boundaries:
//! - The single persisted [`SessionRecord`] and its freshness classification
//! - Transient [`ProxyRequest`] values and the [`HttpMethod`] set the upstream accepts
//! - The flat [`ErrorKind`] taxonomy every transport reports failures with
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use scalegate_common::{SessionRecord, SessionStatus, DEFAULT_STALE_AFTER_SECS};
//!
//! let record = SessionRecord::from_session_id("abc123");
//! assert_eq!(record.session_id(), Some("abc123"));
//!
//! let later = record.created_at + Duration::hours(13);
//! let status = record.status_at(later, DEFAULT_STALE_AFTER_SECS).unwrap();
//! assert!(matches!(status, SessionStatus::Stale { .. }));
//! ```

/// Error classification shared by every layer.
pub mod error;
/// Proxy request values and HTTP method parsing.
pub mod request;
/// Session record and freshness status.
pub mod session;

pub use error::ErrorKind;
pub use request::{HttpMethod, ParseMethodError, ProxyRequest};
pub use session::{
    COOKIE_HEADER, DEFAULT_STALE_AFTER_SECS, SESSION_COOKIE, SessionRecord, SessionStatus,
    cookie_session_id,
};
