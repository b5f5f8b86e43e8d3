use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uc_core::ports::SystemClipboardPort;
use uc_core::{ChangeSource, ClipboardSnapshot, ClipboardState, ClipboardSyncPhase};

use super::{OutboundQueue, MIN_TICK};
use crate::sync::SyncEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    /// A local copy was stamped and queued for publish.
    Captured(ClipboardSnapshot),
    /// A value accepted from the peer was written to the system clipboard.
    AppliedPeerValue(ClipboardSnapshot),
    /// The current value was queued again after a failed publish.
    Requeued(ClipboardSnapshot),
}

/// Watches the system clipboard and keeps it in step with [`ClipboardState`].
///
/// Values the poller writes itself are remembered, so reading them back on
/// the next tick is not mistaken for a local copy.
pub struct ClipboardPoller {
    engine: Arc<SyncEngine>,
    clipboard: Arc<dyn SystemClipboardPort>,
    outbound: OutboundQueue,
    interval: Duration,
    phase: ClipboardSyncPhase,
    seen_generation: u64,
    last_observed: Option<Vec<u8>>,
}

impl ClipboardPoller {
    pub fn new(
        engine: Arc<SyncEngine>,
        clipboard: Arc<dyn SystemClipboardPort>,
        outbound: OutboundQueue,
        interval: Duration,
    ) -> Self {
        let seen_generation = engine.state().generation();
        Self {
            engine,
            clipboard,
            outbound,
            interval: interval.max(MIN_TICK),
            phase: ClipboardSyncPhase::Idle,
            seen_generation,
            last_observed: None,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Clipboard poller started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => match self.tick() {
                    Ok(PollOutcome::Unchanged) => trace!("Clipboard unchanged"),
                    Ok(outcome) => debug!(?outcome, "Clipboard poll"),
                    Err(err) => warn!(error = %format!("{err:#}"), "Clipboard poll failed"),
                },
            }
        }

        info!("Clipboard poller stopped");
    }

    /// One poll cycle.
    pub fn tick(&mut self) -> Result<PollOutcome> {
        self.phase = self
            .phase
            .start_polling()
            .unwrap_or(ClipboardSyncPhase::Polling);
        let outcome = self.poll_once();
        if let Ok(PollOutcome::Captured(_) | PollOutcome::Requeued(_)) = &outcome {
            // The publish itself runs on the publisher task.
            self.phase = self.phase.start_publishing().unwrap_or(self.phase);
        }
        self.phase = self.phase.finish();
        outcome
    }

    fn poll_once(&mut self) -> Result<PollOutcome> {
        let state: &ClipboardState = self.engine.state();

        let observed = self
            .clipboard
            .read()
            .context("failed to read system clipboard")?;
        if let Some(value) = observed {
            if self.last_observed.as_deref() != Some(value.as_slice()) {
                self.last_observed = Some(value.clone());
                if state.current().value != value {
                    let change = state.record_local(value);
                    self.seen_generation = change.generation;
                    self.outbound.push(change.snapshot.clone());
                    return Ok(PollOutcome::Captured(change.snapshot));
                }
            }
        }

        if let Some(change) = state.change_since(self.seen_generation) {
            if change.source == ChangeSource::Peer {
                self.clipboard
                    .write(&change.snapshot.value)
                    .context("failed to write peer value to system clipboard")?;
                // Remember what the platform reports back, which may be a
                // normalized form of what was written.
                self.last_observed = self
                    .clipboard
                    .read()
                    .context("failed to read back system clipboard")?
                    .or_else(|| Some(change.snapshot.value.clone()));
                self.seen_generation = change.generation;
                return Ok(PollOutcome::AppliedPeerValue(change.snapshot));
            }
            self.seen_generation = change.generation;
        }

        if self.engine.take_republish_request() {
            let current = state.current();
            if &current.origin_id == state.local_peer() && current.logical_clock > 0 {
                self.outbound.push(current.clone());
                return Ok(PollOutcome::Requeued(current));
            }
        }

        Ok(PollOutcome::Unchanged)
    }
}
