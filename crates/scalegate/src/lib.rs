//! # scalegate
//!
//! Session lifecycle and request forwarding for one upstream REST API.
//!
//! ## Core Components
//!
//! - [`ScaleProxy`]: the five operations (`run_api`, `query_api`,
//!   `generate_session`, `get_session`, `kill_session`) every transport exposes
//! - [`SessionManager`]: owns the single session record and serializes rotations
//! - [`SessionStore`]: where the record lives ([`FileSessionStore`], [`MemorySessionStore`])
//! - [`CredentialProvider`]: how sessions are created and destroyed
//!   ([`CommandProvider`], [`LoginProvider`])
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scalegate::{CommandProvider, FileSessionStore, ScaleProxy, SessionManager};
//! use scalegate_client::{UpstreamClient, UpstreamConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileSessionStore::new("/var/lib/scalegate/session.json")?);
//! let provider = Arc::new(CommandProvider::new(
//!     vec!["/opt/scale/login".into()],
//!     vec!["/opt/scale/logout".into()],
//! )?);
//! let sessions = Arc::new(SessionManager::new(store, provider));
//! let client = UpstreamClient::new(UpstreamConfig::new("https://scale.local/rest/v1")?)?;
//!
//! let proxy = ScaleProxy::new(sessions, client);
//! proxy.generate_session().await?;
//! let nodes = proxy.query_api("/Node").await?;
//! println!("{nodes}");
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod manager;
pub mod proxy;
pub mod store;

pub use credentials::{
    CommandProvider, CredentialError, CredentialProvider, Credentials, LoginProvider,
};
pub use error::{ProxyError, Result};
pub use manager::SessionManager;
pub use proxy::{
    ScaleProxy, SessionGenerated, SessionKilled, StalePolicy, session_message, status_message,
};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
