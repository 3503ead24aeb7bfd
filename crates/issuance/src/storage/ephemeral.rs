//! In-memory short-TTL storage for offers and grants

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Clock, StoreError, StoreResult};
use crate::traits::EphemeralStore;

struct EphemeralEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-memory implementation of [`EphemeralStore`]
///
/// Expiry is evaluated against the injected [`Clock`] on every read, so
/// stale entries are never returned. Memory held by entries nobody takes is
/// reclaimed by [`EphemeralStore::purge_expired`], which the engine's
/// [`EphemeralPurger`](crate::storage::EphemeralPurger) calls on a timer.
pub struct MemoryEphemeralStore {
    entries: DashMap<String, EphemeralEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryEphemeralStore {
    /// Create an empty store driven by `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expiry(&self, ttl: Duration) -> StoreResult<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| StoreError::Unavailable {
            reason: format!("ttl {ttl:?} out of range"),
        })?;
        Ok(self.clock.now() + ttl)
    }
}

#[async_trait]
impl EphemeralStore for MemoryEphemeralStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.expiry(ttl)?;
        let now = self.clock.now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().expires_at > now {
                    return Err(StoreError::Duplicate {
                        key: key.to_string(),
                    });
                }
                entry.insert(EphemeralEntry { value, expires_at });
            }
            Entry::Vacant(entry) => {
                entry.insert(EphemeralEntry { value, expires_at });
            }
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .and_then(|(_, entry)| (entry.expires_at > now).then_some(entry.value)))
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        Ok(removed)
    }
}
