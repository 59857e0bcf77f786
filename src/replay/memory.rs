//! Process-local replay store.

use super::{expiry, is_live, ReplayKeyStore, ReplayStoreError};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory replay store. Reservations are lost on restart.
pub struct InMemoryReplayKeyStore {
    entries: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
    clock: Box<dyn Clock>,
}

impl Default for InMemoryReplayKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReplayKeyStore {
    /// Empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Empty store on a custom clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Box::new(clock),
        }
    }

    /// Number of live reservations.
    pub async fn len(&self) -> usize {
        let now = self.clock.now_utc();
        self.entries
            .lock()
            .await
            .values()
            .filter(|expires_at| is_live(**expires_at, now))
            .count()
    }

    /// Whether no live reservation exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReplayKeyStore for InMemoryReplayKeyStore {
    async fn put_if_absent(&self, key: &str, ttl: Option<Duration>) -> Result<bool, ReplayStoreError> {
        let now = self.clock.now_utc();
        let mut entries = self.entries.lock().await;

        entries.retain(|_, expires_at| is_live(*expires_at, now));
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), expiry(now, ttl));
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), ReplayStoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
