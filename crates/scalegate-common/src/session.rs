use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the upstream session cookie.
pub const COOKIE_HEADER: &str = "Cookie";

/// Cookie name the upstream uses for its session identifier.
pub const SESSION_COOKIE: &str = "sessionID";

/// Age at which a session is reported as stale (12 hours).
pub const DEFAULT_STALE_AFTER_SECS: u64 = 43_200;

/// The single persisted session credential.
///
/// A record holds the headers that authenticate upstream calls together with
/// the moment it was (re)generated. Age is always derived from `created_at`,
/// never from the storage medium.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Header name to value. Must include a `Cookie` entry with `sessionID=<id>`.
    pub headers: BTreeMap<String, String>,

    /// When the session was last generated.
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a record from credential headers, stamped with the current time.
    #[must_use]
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Self {
            headers,
            created_at: Utc::now(),
        }
    }

    /// Creates a record whose only header is `Cookie: sessionID=<id>`.
    #[must_use]
    pub fn from_session_id(session_id: impl AsRef<str>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            COOKIE_HEADER.to_string(),
            format!("{SESSION_COOKIE}={}", session_id.as_ref()),
        );
        Self::new(headers)
    }

    /// Overrides the creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the cookie header value, matching the header name case-insensitively.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(COOKIE_HEADER))
            .map(|(_, value)| value.as_str())
    }

    /// Extracts the opaque session identifier from the cookie header.
    ///
    /// Returns `None` when there is no cookie, no `sessionID` pair, or the
    /// value is empty. Such a record cannot authenticate anything.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.cookie().and_then(cookie_session_id)
    }

    /// Age in whole seconds at `now`. Clock skew into the future counts as zero.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(now.signed_duration_since(self.created_at).num_seconds()).unwrap_or(0)
    }

    /// Classifies the record at `now` against `stale_after_secs`.
    ///
    /// Returns `None` if the record carries no usable session id.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>, stale_after_secs: u64) -> Option<SessionStatus> {
        let session_id = self.session_id()?;
        Some(SessionStatus::classify(
            session_id,
            self.age_at(now),
            stale_after_secs,
        ))
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Finds the `sessionID` value in a `Cookie` header such as `a=1; sessionID=xyz`.
#[must_use]
pub fn cookie_session_id(cookie: &str) -> Option<&str> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Freshness of the stored session.
///
/// Staleness never deletes the record; it only tells the caller that a new
/// session should be generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Younger than the staleness threshold.
    Fresh {
        /// The stored session identifier.
        session_id: String,
        /// Age in seconds.
        age_secs: u64,
    },
    /// At or beyond the staleness threshold.
    Stale {
        /// The stored session identifier.
        session_id: String,
        /// Age in seconds.
        age_secs: u64,
    },
}

impl SessionStatus {
    /// `Fresh` iff `age_secs < stale_after_secs`; the boundary itself is `Stale`.
    #[must_use]
    pub fn classify(session_id: impl Into<String>, age_secs: u64, stale_after_secs: u64) -> Self {
        let session_id = session_id.into();
        if age_secs < stale_after_secs {
            Self::Fresh {
                session_id,
                age_secs,
            }
        } else {
            Self::Stale {
                session_id,
                age_secs,
            }
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Fresh { session_id, .. } | Self::Stale { session_id, .. } => session_id,
        }
    }

    #[must_use]
    pub const fn age_secs(&self) -> u64 {
        match self {
            Self::Fresh { age_secs, .. } | Self::Stale { age_secs, .. } => *age_secs,
        }
    }

    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh {
                session_id,
                age_secs,
            } => write!(f, "Found Valid Session: {session_id} | Age: {age_secs} seconds"),
            Self::Stale { session_id, .. } => write!(
                f,
                "Found a Session, but it is not valid (Over 12Hrs Old), please generate another one: {session_id} [Kill This Session ID]"
            ),
        }
    }
}
