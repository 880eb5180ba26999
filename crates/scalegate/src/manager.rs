//! Session lifecycle: generate, inspect and kill the single stored session.

use std::sync::Arc;

use chrono::Utc;
use scalegate_common::{DEFAULT_STALE_AFTER_SECS, SessionRecord, SessionStatus};
use tokio::sync::{Mutex, RwLock};

use crate::credentials::CredentialProvider;
use crate::error::{ProxyError, Result};
use crate::store::SessionStore;

/// Owns the session record and the provider that creates and destroys it.
///
/// Two locks guard the record:
/// - `mutation` serializes generate and kill end-to-end, provider call included
/// - `swap` is held shared by readers and exclusively while the record is replaced
///
/// Readers therefore only ever wait for the swap itself, never for a login.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn CredentialProvider>,
    stale_after_secs: u64,
    mutation: Mutex<()>,
    swap: RwLock<()>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            store,
            provider,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            mutation: Mutex::new(()),
            swap: RwLock::new(()),
        }
    }

    /// Overrides the staleness threshold (default 12 hours).
    #[must_use]
    pub const fn with_stale_after_secs(mut self, stale_after_secs: u64) -> Self {
        self.stale_after_secs = stale_after_secs;
        self
    }

    #[must_use]
    pub const fn stale_after_secs(&self) -> u64 {
        self.stale_after_secs
    }

    /// Acquires a new session and makes it the current record.
    ///
    /// Nothing is committed unless the provider succeeds and the record is
    /// persisted. If persisting fails the new session is revoked again.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::GenerationFailed`] if the provider fails, returns
    /// credentials without a session id, or the record cannot be saved.
    pub async fn generate_session(&self) -> Result<String> {
        let _mutation = self.mutation.lock().await;

        let credentials = self
            .provider
            .acquire()
            .await
            .map_err(|e| ProxyError::GenerationFailed(e.to_string()))?;

        let session_id = credentials
            .session_id()
            .ok_or_else(|| {
                ProxyError::GenerationFailed("credentials did not contain a session ID".to_string())
            })?
            .to_string();

        let record = SessionRecord::new(credentials.headers);
        let saved = {
            let _swap = self.swap.write().await;
            self.store.save(&record).await
        };

        if let Err(e) = saved {
            log::error!("Failed to persist new session: {e}");
            if let Err(revoke_err) = self.provider.revoke(&session_id).await {
                log::warn!("Failed to revoke unpersisted session: {revoke_err}");
            }
            return Err(ProxyError::GenerationFailed(format!(
                "failed to persist session: {e}"
            )));
        }

        log::info!("Generated new session via {} provider", self.provider.name());
        Ok(session_id)
    }

    /// Classifies the current record without modifying it.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::NoSession`] if there is no usable record.
    pub async fn get_session(&self) -> Result<SessionStatus> {
        self.snapshot().await.map(|(_, status)| status)
    }

    /// Returns a copy of the current record together with its status.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::NoSession`] if there is no usable record.
    pub async fn snapshot(&self) -> Result<(SessionRecord, SessionStatus)> {
        let record = self.current_record().await.ok_or(ProxyError::NoSession)?;
        let status = record
            .status_at(Utc::now(), self.stale_after_secs)
            .ok_or(ProxyError::NoSession)?;
        Ok((record, status))
    }

    /// Revokes a session and clears the record if it was the stored one.
    ///
    /// With `None` (or an empty id) the stored session is killed. An explicit
    /// id is revoked even if it is not the stored one, and the record is then
    /// left alone.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::NoSession`] if no id was given and nothing is stored
    /// - [`ProxyError::KillFailed`] if the provider fails; the record is untouched
    pub async fn kill_session(&self, session_id: Option<&str>) -> Result<String> {
        let _mutation = self.mutation.lock().await;

        let current = self.current_record().await;
        let stored_id = current.as_ref().and_then(SessionRecord::session_id);

        let target = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => stored_id.ok_or(ProxyError::NoSession)?,
        };

        self.provider
            .revoke(target)
            .await
            .map_err(|e| ProxyError::KillFailed(e.to_string()))?;

        if stored_id == Some(target) {
            let _swap = self.swap.write().await;
            self.store.clear().await.map_err(|e| {
                ProxyError::KillFailed(format!("session revoked but record not cleared: {e}"))
            })?;
        } else {
            log::info!("Killed a session that is not the stored one; record kept");
        }

        Ok(target.to_string())
    }

    /// Loads the record under the shared lock. Unreadable records count as absent.
    async fn current_record(&self) -> Option<SessionRecord> {
        let _swap = self.swap.read().await;
        match self.store.load().await {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Ignoring unreadable session record: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("provider", &self.provider.name())
            .field("stale_after_secs", &self.stale_after_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use scalegate_common::{COOKIE_HEADER, SESSION_COOKIE};

    use super::*;
    use crate::credentials::{CredentialError, Credentials};
    use crate::store::{FileSessionStore, MemorySessionStore, StoreError};

    /// Issues `S1`, `S2`, ... and records what it was asked to revoke.
    #[derive(Default)]
    struct CountingProvider {
        issued: AtomicUsize,
        fail_acquire: AtomicBool,
        fail_revoke: AtomicBool,
        revoked: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn acquire(&self) -> std::result::Result<Credentials, CredentialError> {
            if self.fail_acquire.load(Ordering::SeqCst) {
                return Err(CredentialError::CommandFailed {
                    status: Some(1),
                    stderr: "login refused".to_string(),
                });
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;

            let mut headers = BTreeMap::new();
            headers.insert(COOKIE_HEADER.to_string(), format!("{SESSION_COOKIE}=S{n}"));
            headers.insert("X-Generation".to_string(), n.to_string());
            Ok(Credentials { headers })
        }

        async fn revoke(&self, session_id: &str) -> std::result::Result<(), CredentialError> {
            if self.fail_revoke.load(Ordering::SeqCst) {
                return Err(CredentialError::CommandFailed {
                    status: Some(2),
                    stderr: "logout refused".to_string(),
                });
            }
            self.revoked.lock().unwrap().push(session_id.to_string());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self) -> std::result::Result<Option<SessionRecord>, StoreError> {
            Ok(None)
        }

        async fn save(&self, _record: &SessionRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Storage("disk full".to_string()))
        }

        async fn clear(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    fn setup() -> (SessionManager, Arc<MemorySessionStore>, Arc<CountingProvider>) {
        let store = Arc::new(MemorySessionStore::new());
        let provider = Arc::new(CountingProvider::default());
        let manager = SessionManager::new(store.clone(), provider.clone());
        (manager, store, provider)
    }

    #[tokio::test]
    async fn test_get_without_record_is_no_session() {
        let (manager, _store, _provider) = setup();
        assert!(matches!(
            manager.get_session().await,
            Err(ProxyError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_generate_then_get_is_fresh() {
        let (manager, _store, _provider) = setup();

        let id = manager.generate_session().await.unwrap();
        assert_eq!(id, "S1");

        let status = manager.get_session().await.unwrap();
        assert!(status.is_fresh());
        assert_eq!(status.session_id(), "S1");
        assert!(status.age_secs() <= 1);
    }

    #[tokio::test]
    async fn test_threshold_age_is_stale() {
        let (manager, store, _provider) = setup();
        let record = SessionRecord::from_session_id("old")
            .with_created_at(Utc::now() - Duration::seconds(43_200));
        store.save(&record).await.unwrap();

        let status = manager.get_session().await.unwrap();
        assert!(matches!(status, SessionStatus::Stale { .. }));
        assert_eq!(status.session_id(), "old");
        assert!(status.age_secs() >= 43_200);

        // Inspection never removes the record
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(store.clone(), Arc::new(CountingProvider::default()))
            .with_stale_after_secs(60);
        let record = SessionRecord::from_session_id("S1")
            .with_created_at(Utc::now() - Duration::seconds(61));
        store.save(&record).await.unwrap();

        assert!(!manager.get_session().await.unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_record_without_session_id_is_no_session() {
        let (manager, store, _provider) = setup();
        store.save(&SessionRecord::new(BTreeMap::new())).await.unwrap();

        assert!(matches!(
            manager.get_session().await,
            Err(ProxyError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_no_session() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let store = Arc::new(FileSessionStore::new(path).unwrap());
        let manager = SessionManager::new(store, Arc::new(CountingProvider::default()));

        assert!(matches!(
            manager.get_session().await,
            Err(ProxyError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_failed_generate_commits_nothing() {
        let (manager, store, provider) = setup();
        manager.generate_session().await.unwrap();
        let before = store.load().await.unwrap();

        provider.fail_acquire.store(true, Ordering::SeqCst);
        let err = manager.generate_session().await.unwrap_err();
        assert!(matches!(err, ProxyError::GenerationFailed(ref m) if m.contains("login refused")));

        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unpersisted_session_is_revoked() {
        let provider = Arc::new(CountingProvider::default());
        let manager = SessionManager::new(Arc::new(BrokenStore), provider.clone());

        let err = manager.generate_session().await.unwrap_err();
        assert!(matches!(err, ProxyError::GenerationFailed(ref m) if m.contains("disk full")));
        assert_eq!(*provider.revoked.lock().unwrap(), vec!["S1".to_string()]);
    }

    #[tokio::test]
    async fn test_kill_stored_session() {
        let (manager, _store, provider) = setup();
        manager.generate_session().await.unwrap();

        let killed = manager.kill_session(None).await.unwrap();
        assert_eq!(killed, "S1");
        assert_eq!(*provider.revoked.lock().unwrap(), vec!["S1".to_string()]);
        assert!(matches!(
            manager.get_session().await,
            Err(ProxyError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_kill_without_record_or_id() {
        let (manager, _store, provider) = setup();
        assert!(matches!(
            manager.kill_session(None).await,
            Err(ProxyError::NoSession)
        ));
        assert!(matches!(
            manager.kill_session(Some("  ")).await,
            Err(ProxyError::NoSession)
        ));
        assert!(provider.revoked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kill_other_id_keeps_record() {
        let (manager, _store, provider) = setup();
        manager.generate_session().await.unwrap();

        manager.kill_session(Some("orphan")).await.unwrap();
        assert_eq!(*provider.revoked.lock().unwrap(), vec!["orphan".to_string()]);
        assert_eq!(manager.get_session().await.unwrap().session_id(), "S1");
    }

    #[tokio::test]
    async fn test_failed_kill_leaves_record() {
        let (manager, store, provider) = setup();
        manager.generate_session().await.unwrap();
        let before = store.load().await.unwrap();

        provider.fail_revoke.store(true, Ordering::SeqCst);
        let err = manager.kill_session(Some("S1")).await.unwrap_err();
        assert!(matches!(err, ProxyError::KillFailed(ref m) if m.contains("logout refused")));
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_generate_and_read_never_mix() {
        let (manager, _store, _provider) = setup();
        let manager = Arc::new(manager);
        manager.generate_session().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.generate_session().await.unwrap();
            }));
        }
        for _ in 0..32 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                let (record, status) = manager.snapshot().await.unwrap();
                let generation = record.headers.get("X-Generation").unwrap();
                assert_eq!(status.session_id(), format!("S{generation}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.get_session().await.unwrap().session_id(), "S9");
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (manager, _store, _provider) = setup();

        let id = manager.generate_session().await.unwrap();
        assert_eq!(id, "S1");

        let status = manager.get_session().await.unwrap();
        assert!(status.age_secs() < 43_200);
        assert!(
            status
                .to_string()
                .starts_with("Found Valid Session: S1 | Age: ")
        );

        manager.kill_session(Some("S1")).await.unwrap();
        assert!(matches!(
            manager.get_session().await,
            Err(ProxyError::NoSession)
        ));
    }
}
