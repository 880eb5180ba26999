//! Session record persistence.
//!
//! A store holds at most one [`SessionRecord`]. Saving overwrites it wholesale
//! and clearing removes it. Stores make no ordering guarantees of their own;
//! [`SessionManager`](crate::SessionManager) serializes all writes.
//!
//! ## File Layout
//!
//! ```text
//! ~/.local/share/scalegate/
//! ├── session.json                  (the current record, mode 0600)
//! └── session.json.<pid>.<uuid>.tmp  (transient, renamed over session.json on save)
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use scalegate_common::SessionRecord;
use thiserror::Error;

/// Errors raised by a session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Holder of the single session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the current record, `None` if absent.
    async fn load(&self) -> Result<Option<SessionRecord>, StoreError>;

    /// Replaces the current record.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Removes the current record. No-op if absent.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Stores the record as a JSON file.
///
/// Writes go to a temp file that is renamed over the target, so a reader in
/// any process sees either the old record or the new one. Each write gets its
/// own temp file, so two processes sharing a path never write the same inode.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: Arc<PathBuf>,
}

impl FileSessionStore {
    /// Creates a store at `path`, creating its parent directory (owner-only).
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent)?;
        }

        Ok(Self {
            path: Arc::new(path),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs blocking file I/O off the async worker threads.
    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| StoreError::Storage(format!("Task join error: {e}")))?
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>, StoreError> {
        self.run(|path| {
            if !path.exists() {
                return Ok(None);
            }
            let json = fs::read_to_string(path)?;
            Ok(Some(serde_json::from_str(&json)?))
        })
        .await
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)?;

        self.run(move |path| {
            let temp_path = temp_path_for(path);
            if let Err(e) = write_private_file(&temp_path, &json)
                .and_then(|()| fs::rename(&temp_path, path).map_err(StoreError::from))
            {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
            log::debug!("Saved session record to {}", path.display());
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.run(|path| {
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Removed session record {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            Ok(())
        })
        .await
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", dir.display())))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir)
        .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", dir.display())))
}

/// Sibling temp path unique to this process and write.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{}.tmp", std::process::id(), uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

/// Keeps the record in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: RwLock<Option<SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>, StoreError> {
        let record = self
            .record
            .read()
            .map_err(|e| StoreError::Storage(format!("Session lock poisoned: {e}")))?;
        Ok(record.clone())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut slot = self
            .record
            .write()
            .map_err(|e| StoreError::Storage(format!("Session lock poisoned: {e}")))?;
        *slot = Some(record.clone());
        drop(slot);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self
            .record
            .write()
            .map_err(|e| StoreError::Storage(format!("Session lock poisoned: {e}")))?;
        *slot = None;
        drop(slot);
        Ok(())
    }
}
