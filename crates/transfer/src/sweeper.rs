//! Periodic retention: drops expired date buckets and idle transfer records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::catalog::CatalogStore;
use crate::tracker::TransferTracker;
use crate::{Clock, system_clock};

/// Retention settings.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Delete expired buckets. When off, sweeps only forget idle transfers.
    pub purge: bool,
    /// Buckets dated strictly before `today - retention_days` are deleted.
    pub retention_days: u32,
    /// Time between sweeps.
    pub interval: Duration,
    /// Transfer records untouched for this long are forgotten. `None` keeps them.
    pub idle_timeout: Option<Duration>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            purge: true,
            retention_days: 1,
            interval: Duration::from_secs(24 * 60 * 60),
            idle_timeout: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
    pub evicted: usize,
}

pub struct RetentionSweeper {
    config: SweeperConfig,
    store: Arc<dyn CatalogStore>,
    tracker: Arc<TransferTracker>,
    clock: Clock,
    span: Span,
}

impl RetentionSweeper {
    pub fn new(
        config: SweeperConfig,
        store: Arc<dyn CatalogStore>,
        tracker: Arc<TransferTracker>,
        span: Span,
    ) -> Self {
        Self {
            config,
            store,
            tracker,
            clock: system_clock(),
            span,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs a single sweep.
    ///
    /// A bucket that cannot be deleted is logged and skipped; the rest of
    /// the sweep still runs.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        if self.config.purge {
            self.purge(&mut report).await;
        }

        if let Some(idle) = self.config.idle_timeout {
            report.evicted = self.tracker.evict_idle(idle);
            if report.evicted > 0 {
                tracing::debug!(parent: &self.span, evicted = report.evicted, "evicted idle transfers");
            }
        }

        report
    }

    async fn purge(&self, report: &mut SweepReport) {
        let store = Arc::clone(&self.store);
        let days = self.config.retention_days;
        let today = (self.clock)().date_naive();
        let purge = tokio::task::spawn_blocking(move || store.purge_older_than(days, today)).await;

        match purge {
            Ok(Ok(purged)) => {
                for path in &purged.removed {
                    tracing::debug!(parent: &self.span, path = %path.display(), "removed expired bucket");
                }
                for (path, e) in &purged.failed {
                    tracing::warn!(
                        parent: &self.span,
                        path = %path.display(),
                        "failed to remove expired bucket: {e}"
                    );
                }
                report.removed = purged.removed.len();
                report.failed = purged.failed.len();
            }
            Ok(Err(e)) => {
                tracing::error!(parent: &self.span, "failed to list upload root: {e}");
            }
            Err(e) => {
                tracing::error!(parent: &self.span, "purge task failed: {e}");
            }
        }
    }

    /// Sweeps now and then every `interval` until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        })
    }
}
