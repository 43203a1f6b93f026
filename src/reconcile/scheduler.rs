//! Periodic scheduling of reconciliation passes

use crate::reconcile::reconciler::Reconciler;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Default period between passes
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(600);

/// Runs a pass at startup and then once per interval
///
/// Each tick spawns its pass, so a slow pass never delays the timer; the
/// reconciler's own guard turns overlapping passes into no-ops.
pub struct ReconcileScheduler {
    reconciler: Reconciler,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Start ticking until `shutdown` turns true or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut passes = JoinSet::new();

            info!(
                "Reconciliation scheduled every {}s",
                self.interval.as_secs()
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reconciler = self.reconciler.clone();
                        passes.spawn(async move { reconciler.reconcile().await });
                    }
                    Some(finished) = passes.join_next(), if !passes.is_empty() => {
                        match finished {
                            Ok(attempted) => debug!("Reconciliation pass attempted {} creation(s)", attempted),
                            Err(e) => error!("Reconciliation pass task failed: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(
                "Reconciliation scheduler stopping, waiting for {} pass(es)",
                passes.len()
            );
            // Let in-flight creations settle so joined lobbies get initialized
            while let Some(finished) = passes.join_next().await {
                if let Err(e) = finished {
                    error!("Reconciliation pass task failed: {}", e);
                }
            }
            info!("Reconciliation scheduler stopped");
        })
    }
}
