//! Periodic eviction of expired offers and grants
//!
//! Reads already ignore expired entries; this task bounds memory by
//! removing entries that were issued and never redeemed.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::traits::EphemeralStore;

/// Calls [`EphemeralStore::purge_expired`] on every registered store at a
/// fixed interval
#[derive(Clone)]
pub struct EphemeralPurger {
    stores: Vec<(&'static str, Arc<dyn EphemeralStore>)>,
    interval: Duration,
}

impl EphemeralPurger {
    /// Create a purger with no stores
    pub fn new(interval: Duration) -> Self {
        Self {
            stores: Vec::new(),
            interval,
        }
    }

    /// Register a store under a name used in logs
    #[must_use]
    pub fn with_store(mut self, name: &'static str, store: Arc<dyn EphemeralStore>) -> Self {
        self.stores.push((name, store));
        self
    }

    /// Purge every store once, returning the total number of entries removed
    ///
    /// A failing store is logged and skipped.
    pub async fn purge_once(&self) -> usize {
        let mut removed = 0;
        for (name, store) in &self.stores {
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => {
                    debug!(store = *name, removed = n, "Purged expired entries");
                    removed += n;
                }
                Err(e) => warn!(store = *name, error = %e, "Failed to purge expired entries"),
            }
        }
        removed
    }

    /// Purge on the configured interval until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.purge_once().await;
                }
                () = shutdown.cancelled() => {
                    info!("Ephemeral store purger shutting down");
                    return;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) as a background task
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
