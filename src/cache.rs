//! Short-lived key-value storage with per-entry expiry.
//!
//! OTP codes and pending registrations live here instead of the database. The
//! core only depends on [`TtlStore`], so a single instance can use the
//! in-process [`InMemoryTtlStore`] while a multi-instance deployment plugs in a
//! shared cache. Entries in the in-process store vanish on restart.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::trace;

/// Get/set/delete/exists with TTL, plus an atomic `take`.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Returns the live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Removes the entry and returns it if it was still live.
    ///
    /// Must be atomic: two concurrent takes of the same key never both see the value.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Removes the entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.take(key).await?.is_some())
    }

    /// Whether a live entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Process-local [`TtlStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryTtlStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryTtlStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TtlStore for InMemoryTtlStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        // Expired entries decay on touch.
        if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            trace!(key, "Dropped expired entry");
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + ttl;
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        Ok(self
            .entries
            .remove(key)
            .and_then(|(_, e)| (!e.is_expired(now)).then_some(e.value)))
    }
}
