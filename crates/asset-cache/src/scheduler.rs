//! Background cleanup task.
//!
//! Owned by an [`AssetCache`](crate::AssetCache): started on open, cancelled
//! on shutdown or drop. Cancellation is only observed between passes, so
//! awaiting [`CleanupScheduler::stop`] lets an in-flight pass finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheShared;

pub(crate) struct CleanupScheduler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Spawn the periodic task on the current runtime.
    pub(crate) fn spawn(shared: Arc<CacheShared>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(shared, interval, token.clone()));
        Self { token, handle }
    }

    /// Signal the task without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Signal the task and wait for it to exit.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "cleanup task ended abnormally");
        }
    }
}

impl std::fmt::Debug for CleanupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupScheduler")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

async fn run(shared: Arc<CacheShared>, interval: Duration, shutdown: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "cleanup scheduler starting");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("cleanup scheduler stopping");
                break;
            }

            _ = ticker.tick() => {
                let report = shared.cleanup_pass().await;
                debug!(
                    expired_removed = report.expired_removed,
                    access_logs_pruned = report.access_logs_pruned,
                    disk_usage_bytes = report.disk_usage_bytes,
                    "scheduled cleanup pass finished"
                );
            }
        }
    }
}
