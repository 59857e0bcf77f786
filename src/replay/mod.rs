//! Replay protection for inbound webhooks.
//!
//! A store reserves keys atomically. A key moves from absent to reserved on
//! a successful [`ReplayKeyStore::put_if_absent`], and back to absent on
//! [`ReplayKeyStore::remove`] or when its TTL elapses. Reserving a reserved
//! key is rejected.

pub mod file;
pub mod memory;

pub use crate::errors::ReplayStoreError;
pub use file::FileReplayKeyStore;
pub use memory::InMemoryReplayKeyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Atomic test-and-reserve of webhook keys.
#[async_trait]
pub trait ReplayKeyStore: Send + Sync {
    /// Reserve `key`. Returns `true` if it was absent (or expired), `false`
    /// if it is already reserved. `None` or a zero TTL never expires.
    async fn put_if_absent(&self, key: &str, ttl: Option<Duration>) -> Result<bool, ReplayStoreError>;

    /// Release `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), ReplayStoreError>;
}

#[async_trait]
impl<S: ReplayKeyStore + ?Sized> ReplayKeyStore for Arc<S> {
    async fn put_if_absent(&self, key: &str, ttl: Option<Duration>) -> Result<bool, ReplayStoreError> {
        (**self).put_if_absent(key, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), ReplayStoreError> {
        (**self).remove(key).await
    }
}

/// Expiry instant for a reservation made at `now`.
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = ttl.filter(|ttl| !ttl.is_zero())?;
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    now.checked_add_signed(ttl)
}

pub(crate) fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.map_or(true, |at| at > now)
}
