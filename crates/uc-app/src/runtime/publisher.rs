use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uc_core::{ClipboardSnapshot, ClipboardSyncPhase};

use crate::sync::{PublishReport, SyncEngine, SyncError};

/// Latest-value handoff from the poller to the publisher.
///
/// Pushing replaces whatever has not been picked up yet, so a burst of
/// copies results in a single publish of the newest one.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: watch::Sender<Option<ClipboardSnapshot>>,
}

impl OutboundQueue {
    pub fn push(&self, snapshot: ClipboardSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }
}

pub fn outbound_queue() -> (OutboundQueue, watch::Receiver<Option<ClipboardSnapshot>>) {
    let (tx, rx) = watch::channel(None);
    (OutboundQueue { tx }, rx)
}

/// Publishes queued local snapshots one at a time.
pub struct OutboundPublisher {
    engine: Arc<SyncEngine>,
    queue: watch::Receiver<Option<ClipboardSnapshot>>,
    phase: ClipboardSyncPhase,
}

impl OutboundPublisher {
    pub fn new(engine: Arc<SyncEngine>, queue: watch::Receiver<Option<ClipboardSnapshot>>) -> Self {
        Self {
            engine,
            queue,
            phase: ClipboardSyncPhase::Idle,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Outbound publisher started");

        loop {
            let queued = tokio::select! {
                _ = shutdown.changed() => break,
                changed = self.queue.changed() => {
                    if changed.is_err() {
                        debug!("Outbound queue closed");
                        break;
                    }
                    self.queue.borrow_and_update().clone()
                }
            };
            let Some(snapshot) = queued else {
                continue;
            };

            self.phase = self
                .phase
                .start_publishing()
                .unwrap_or(ClipboardSyncPhase::Publishing);
            let result = tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, abandoning in-flight publish");
                    break;
                }
                result = self.engine.publish(snapshot) => result,
            };
            self.report(result);
            self.phase = self.phase.finish();
        }

        info!("Outbound publisher stopped");
    }

    fn report(&self, result: Result<PublishReport, SyncError>) {
        match result {
            Ok(PublishReport::Delivered { attempts }) => {
                debug!(attempts, "Publish delivered")
            }
            Ok(PublishReport::PeerWon { winner, .. }) => {
                debug!(winner_clock = winner.logical_clock, "Publish lost to peer value")
            }
            Ok(PublishReport::SuppressedEcho) | Ok(PublishReport::Superseded) => {}
            Err(err) => {
                warn!(
                    error = %err,
                    class = err.class().as_str(),
                    "Publish failed, current value will be re-queued"
                );
                self.engine.request_republish();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uc_core::PeerId;

    #[test]
    fn queue_keeps_only_latest_snapshot() {
        let (queue, mut rx) = outbound_queue();
        for clock in 1..=5 {
            queue.push(ClipboardSnapshot::new(
                format!("v{clock}"),
                clock,
                PeerId::from("peer-a"),
            ));
        }

        assert!(rx.has_changed().unwrap());
        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(latest.logical_clock, 5);
        assert!(!rx.has_changed().unwrap());
    }
}
