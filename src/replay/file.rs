//! File-backed replay store.
//!
//! Stores one file per reserved key under `dirs::data_dir()/<namespace>/replay/`.
//! Files are created with `create_new`, so two processes sharing the
//! directory can never both reserve the same key.

use super::{expiry, is_live, ReplayKeyStore, ReplayStoreError};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Replay store persisted on the local filesystem.
pub struct FileReplayKeyStore {
    dir: PathBuf,
    clock: Box<dyn Clock>,
    lock: Mutex<()>,
}

impl FileReplayKeyStore {
    /// Create a store under `dirs::data_dir()/<namespace>/replay/`.
    pub fn new(namespace: &str) -> Result<Self, ReplayStoreError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| ReplayStoreError::Io("Could not find data directory".to_string()))?;
        Self::with_path(base_dir.join(namespace).join("replay"))
    }

    /// Create a store in a specific directory.
    pub fn with_path(dir: impl Into<PathBuf>) -> Result<Self, ReplayStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| ReplayStoreError::Io(format!("Failed to create replay dir: {}", e)))?;
        Ok(Self {
            dir,
            clock: Box::new(SystemClock),
            lock: Mutex::new(()),
        })
    }

    /// Use a custom clock for expiry decisions.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Directory holding the reservation files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a key. The key is hashed so arbitrary strings are safe
    /// file names.
    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(hash_key(key))
    }

    /// Delete every expired reservation. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, ReplayStoreError> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now_utc();

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| ReplayStoreError::Io(format!("Failed to read replay dir: {}", e)))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ReplayStoreError::Io(format!("Failed to read entry: {}", e)))?
        {
            let path = entry.path();
            match read_expiry(&path).await {
                Ok(Some(expires_at)) if !is_live(expires_at, now) => {
                    remove_if_present(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(ReplayStoreError::Corrupt(reason)) => {
                    debug!(path = %path.display(), %reason, "skipping unreadable replay entry");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ReplayKeyStore for FileReplayKeyStore {
    async fn put_if_absent(&self, key: &str, ttl: Option<Duration>) -> Result<bool, ReplayStoreError> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now_utc();
        let path = self.key_path(key);

        match read_expiry(&path).await {
            Ok(Some(expires_at)) if is_live(expires_at, now) => return Ok(false),
            Ok(Some(_)) => remove_if_present(&path).await?,
            Ok(None) => {}
            Err(err) => return Err(err),
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            // Reserved by another process between the read and the create.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(ReplayStoreError::Io(format!(
                    "Failed to create replay entry: {}",
                    e
                )))
            }
        };

        let content = expiry(now, ttl)
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| ReplayStoreError::Io(format!("Failed to write replay entry: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| ReplayStoreError::Io(format!("Failed to write replay entry: {}", e)))?;

        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), ReplayStoreError> {
        let _guard = self.lock.lock().await;
        remove_if_present(&self.key_path(key)).await
    }
}

/// Read a reservation file.
///
/// `Ok(None)` when absent, `Ok(Some(None))` when it never expires.
async fn read_expiry(path: &Path) -> Result<Option<Option<DateTime<Utc>>>, ReplayStoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ReplayStoreError::Io(format!(
                "Failed to read replay entry: {}",
                e
            )))
        }
    };

    let content = content.trim();
    if content.is_empty() {
        return Ok(Some(None));
    }

    DateTime::parse_from_rfc3339(content)
        .map(|at| Some(Some(at.with_timezone(&Utc))))
        .map_err(|e| ReplayStoreError::Corrupt(format!("{}: {}", path.display(), e)))
}

async fn remove_if_present(path: &Path) -> Result<(), ReplayStoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ReplayStoreError::Io(format!(
            "Failed to delete replay entry: {}",
            e
        ))),
    }
}

/// SHA-256 hex of a replay key.
pub fn hash_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(key.as_bytes()))
}
