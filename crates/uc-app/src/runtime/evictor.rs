use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uc_core::TransferLedger;

use super::MIN_TICK;

/// Periodically fails stalled transfers and drops finished or failed ones
/// past retention.
pub struct TransferEvictor {
    ledger: Arc<TransferLedger>,
    retention: Duration,
    stale_after: Duration,
    interval: Duration,
}

impl TransferEvictor {
    pub fn new(
        ledger: Arc<TransferLedger>,
        retention: Duration,
        stale_after: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            retention,
            stale_after,
            interval: interval.max(MIN_TICK),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            retention_secs = self.retention.as_secs(),
            stale_secs = self.stale_after.as_secs(),
            interval_ms = self.interval.as_millis() as u64,
            "Transfer evictor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.sweep(),
            }
        }

        info!("Transfer evictor stopped");
    }

    fn sweep(&self) {
        let stalled = self.ledger.expire_stale(self.stale_after);
        let evicted = self.ledger.evict(self.retention);
        if stalled > 0 || evicted > 0 {
            debug!(stalled, evicted, "Transfer sweep");
        }
    }
}
