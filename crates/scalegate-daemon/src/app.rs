//! Wires configuration into a ready [`ScaleProxy`].

use std::sync::Arc;
use std::time::Duration;

use scalegate::{
    CommandProvider, CredentialProvider, FileSessionStore, LoginProvider, MemorySessionStore,
    ScaleProxy, SessionManager, SessionStore,
};
use scalegate_client::{UpstreamClient, UpstreamConfig};
use tracing::{info, warn};

use crate::config::{CredentialSettings, GatewayConfig, StoreKind, secret_from_env};
use crate::error::Result;
use crate::paths;

/// Builds the upstream client, session store, credential provider and proxy.
///
/// # Errors
///
/// Returns an error if:
/// - The upstream client cannot be built
/// - The session store directory cannot be created
/// - The login password variable is unset
pub fn build_proxy(config: &GatewayConfig) -> Result<ScaleProxy> {
    let upstream = &config.upstream;
    let mut client_config = UpstreamConfig::new(&upstream.base_url)?
        .with_timeout(Duration::from_secs(upstream.timeout_secs))
        .with_insecure_skip_tls_verify(upstream.insecure_skip_tls_verify);
    if let Some(user_agent) = &upstream.user_agent {
        client_config = client_config.with_user_agent(user_agent.clone());
    }

    if upstream.insecure_skip_tls_verify {
        warn!(
            base_url = %upstream.base_url,
            "TLS certificate verification is DISABLED for the upstream; session cookies can be intercepted"
        );
    }

    let client = UpstreamClient::new(client_config)?;

    let store: Arc<dyn SessionStore> = match config.session.store {
        StoreKind::File => {
            let path = match &config.session.path {
                Some(path) => path.clone(),
                None => paths::session_file()?,
            };
            info!(path = %path.display(), "Using file session store");
            Arc::new(FileSessionStore::new(path)?)
        }
        StoreKind::Memory => {
            info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    let provider: Arc<dyn CredentialProvider> = match &config.credentials {
        CredentialSettings::Command {
            acquire,
            revoke,
            timeout_secs,
        } => Arc::new(
            CommandProvider::new(acquire.clone(), revoke.clone())?
                .with_timeout(Duration::from_secs(*timeout_secs)),
        ),
        CredentialSettings::Login {
            username,
            password_env,
        } => Arc::new(LoginProvider::new(
            client.clone(),
            username.clone(),
            secret_from_env(password_env)?,
        )),
    };
    info!(provider = provider.name(), "Credential provider ready");

    let sessions = Arc::new(
        SessionManager::new(store, provider).with_stale_after_secs(config.session.stale_after_secs),
    );

    Ok(ScaleProxy::new(sessions, client).with_stale_policy(config.session.stale_policy))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::error::DaemonError;

    #[test]
    fn test_build_with_memory_store() {
        let config = GatewayConfig::from_toml(
            r#"
[upstream]
base_url = "https://scale.local/rest/v1"

[session]
store = "memory"
stale_after_secs = 120

[credentials]
provider = "command"
acquire = ["login"]
revoke = ["logout"]
            "#,
        )
        .unwrap();

        let proxy = build_proxy(&config).unwrap();
        assert_eq!(proxy.sessions().stale_after_secs(), 120);
    }

    #[test]
    fn test_build_with_file_store_creates_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("state/session.json");
        let config = GatewayConfig::from_toml(&format!(
            r#"
[upstream]
base_url = "https://scale.local/rest/v1"

[session]
path = "{}"

[credentials]
provider = "command"
acquire = ["login"]
revoke = ["logout"]
            "#,
            path.display()
        ))
        .unwrap();

        build_proxy(&config).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_login_provider_needs_password_variable() {
        let config = GatewayConfig::from_toml(
            r#"
[upstream]
base_url = "https://scale.local/rest/v1"

[session]
store = "memory"

[credentials]
provider = "login"
username = "admin"
password_env = "SCALEGATE_TEST_PASSWORD_THAT_IS_NEVER_SET"
            "#,
        )
        .unwrap();

        assert!(matches!(
            build_proxy(&config),
            Err(DaemonError::Config(_))
        ));
    }
}
