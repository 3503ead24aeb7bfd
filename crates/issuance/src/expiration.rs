//! Expiration sweep
//!
//! Moves VALID credentials whose validity window has elapsed to EXPIRED.
//! Sweeps are independent and idempotent: a crash mid-sweep leaves
//! already-expired rows expired and the rest untouched, and the next sweep
//! picks up where it left off. Writes go through [`Lifecycle`], so two
//! overlapping sweeps (or a sweep racing a revoke) resolve through the
//! status guard rather than double-transitioning a row.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::{ExpirationConfig, ExpirationSchedule};
use crate::core::{Clock, CredentialStatus, IssuanceError, ProcedureId, Result};
use crate::lifecycle::Lifecycle;
use crate::traits::ProcedureStore;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// VALID rows examined
    pub scanned: usize,
    /// Rows moved to EXPIRED
    pub expired: Vec<ProcedureId>,
    /// Rows another writer moved first
    pub skipped: usize,
    /// Rows whose transition failed
    pub failed: usize,
}

/// Periodic VALID → EXPIRED sweeper
#[derive(Clone)]
pub struct CredentialExpirationScheduler {
    store: Arc<dyn ProcedureStore>,
    lifecycle: Lifecycle,
    clock: Arc<dyn Clock>,
    config: ExpirationConfig,
}

impl CredentialExpirationScheduler {
    /// Create a scheduler
    pub fn new(
        store: Arc<dyn ProcedureStore>,
        lifecycle: Lifecycle,
        clock: Arc<dyn Clock>,
        config: ExpirationConfig,
    ) -> Self {
        Self {
            store,
            lifecycle,
            clock,
            config,
        }
    }

    /// Whether [`run`](Self::run) sweeps at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Run a single sweep now
    ///
    /// Only fails if the candidate scan itself fails; per-row failures are
    /// logged and counted.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let candidates = self.store.list_by_status(&[CredentialStatus::Valid]).await?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for procedure in candidates.into_iter().filter(|p| p.is_past_validity(now)) {
            let id = procedure.procedure_id.clone();
            match self
                .lifecycle
                .transition(procedure, CredentialStatus::Expired, |_| Ok(()))
                .await
            {
                Ok(_) => report.expired.push(id),
                Err(IssuanceError::StatusConflict { actual, .. }) => {
                    debug!(procedure_id = %id, %actual, "Procedure changed before expiry, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(procedure_id = %id, error = %e, "Failed to expire credential");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            expired = report.expired.len(),
            skipped = report.skipped,
            failed = report.failed,
            "Expiration sweep completed"
        );
        Ok(report)
    }

    /// Time to wait from `now` until the next sweep
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self.config.schedule {
            ExpirationSchedule::Every { interval } => interval,
            ExpirationSchedule::DailyAt { at } => delay_until_daily(now, at, &Local),
        }
    }

    /// Sweep on schedule until `shutdown` is cancelled
    ///
    /// Returns immediately when the sweep is disabled.
    pub async fn run(&self, shutdown: CancellationToken) {
        if !self.config.enabled {
            info!("Expiration sweep disabled, scheduler not started");
            return;
        }

        loop {
            let delay = self.next_delay(self.clock.now());
            debug!(delay_secs = delay.as_secs(), "Next expiration sweep scheduled");

            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Expiration sweep failed");
                    }
                }
                () = shutdown.cancelled() => {
                    info!("Expiration scheduler shutting down");
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

/// Delay from `now` until the next occurrence of `at` in `tz`
///
/// Skips days on which `at` does not exist (DST gaps); falls back to one day.
fn delay_until_daily<Tz: TimeZone>(now: DateTime<Utc>, at: NaiveTime, tz: &Tz) -> Duration {
    let local_now = now.with_timezone(tz);
    let mut date = local_now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = date.and_time(at).and_local_timezone(tz.clone()).earliest() {
            if candidate > local_now {
                return (candidate - local_now.clone()).to_std().unwrap_or(ONE_DAY);
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    ONE_DAY
}
