use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use super::{ChangeSource, ClipboardSnapshot};
use crate::ids::PeerId;

pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// Result of offering a candidate snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    Applied,
    /// The held snapshot won. It is returned so the loser can converge
    /// without another round trip.
    Rejected { winner: ClipboardSnapshot },
}

impl OfferOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, OfferOutcome::Applied)
    }
}

/// The accepted change at a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardChange {
    pub snapshot: ClipboardSnapshot,
    pub generation: u64,
    pub source: ChangeSource,
}

/// Versioned holder of the last-known clipboard value.
///
/// All mutation goes through one mutex so last-writer-wins is decided
/// against a consistent current value. Every accepted change bumps the
/// generation, which is also broadcast on a watch channel.
pub struct ClipboardState {
    local_peer: PeerId,
    inner: Mutex<StateInner>,
    generation_tx: watch::Sender<u64>,
}

struct StateInner {
    current: ClipboardSnapshot,
    generation: u64,
    source: ChangeSource,
    history: VecDeque<ClipboardSnapshot>,
    history_capacity: usize,
}

impl ClipboardState {
    pub fn new(local_peer: PeerId) -> Self {
        Self::with_history_capacity(local_peer, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(local_peer: PeerId, history_capacity: usize) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(StateInner {
                current: ClipboardSnapshot::initial(local_peer.clone()),
                generation: 0,
                source: ChangeSource::Local,
                history: VecDeque::with_capacity(history_capacity),
                history_capacity,
            }),
            local_peer,
            generation_tx,
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn current(&self) -> ClipboardSnapshot {
        self.lock().current.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Offer a candidate under last-writer-wins.
    ///
    /// The change source is derived from the candidate's origin: anything not
    /// stamped by the local peer counts as peer-originated.
    pub fn offer(&self, candidate: ClipboardSnapshot) -> OfferOutcome {
        let source = if candidate.origin_id == self.local_peer {
            ChangeSource::Local
        } else {
            ChangeSource::Peer
        };

        let mut inner = self.lock();
        if !candidate.supersedes(&inner.current) {
            debug!(
                candidate_clock = candidate.logical_clock,
                candidate_origin = %candidate.origin_id,
                current_clock = inner.current.logical_clock,
                current_origin = %inner.current.origin_id,
                "Clipboard offer rejected as stale"
            );
            return OfferOutcome::Rejected {
                winner: inner.current.clone(),
            };
        }

        let generation = inner.accept(candidate, source);
        drop(inner);
        self.generation_tx.send_replace(generation);
        OfferOutcome::Applied
    }

    /// Stamp a locally captured value and make it current.
    ///
    /// The clock is one past the held clock, so the new snapshot always wins
    /// locally regardless of who produced the held one.
    pub fn record_local(&self, value: Vec<u8>) -> ClipboardChange {
        let mut inner = self.lock();
        let snapshot = ClipboardSnapshot::new(
            value,
            inner.current.logical_clock.saturating_add(1),
            self.local_peer.clone(),
        );
        let generation = inner.accept(snapshot.clone(), ChangeSource::Local);
        drop(inner);
        self.generation_tx.send_replace(generation);
        ClipboardChange {
            snapshot,
            generation,
            source: ChangeSource::Local,
        }
    }

    /// The current change if it is newer than `seen_generation`.
    pub fn change_since(&self, seen_generation: u64) -> Option<ClipboardChange> {
        let inner = self.lock();
        if inner.generation == seen_generation {
            return None;
        }
        Some(ClipboardChange {
            snapshot: inner.current.clone(),
            generation: inner.generation,
            source: inner.source,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Superseded snapshots, oldest first.
    pub fn history(&self) -> Vec<ClipboardSnapshot> {
        self.lock().history.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateInner {
    fn accept(&mut self, snapshot: ClipboardSnapshot, source: ChangeSource) -> u64 {
        let previous = std::mem::replace(&mut self.current, snapshot);
        if self.history_capacity > 0 {
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(previous);
        }
        self.generation += 1;
        self.source = source;
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(value: &str, clock: u64, origin: &str) -> ClipboardSnapshot {
        ClipboardSnapshot::new(value, clock, PeerId::from(origin))
    }

    #[test]
    fn offer_accepts_higher_clock_and_bumps_generation() {
        let state = ClipboardState::new(PeerId::from("peer-a"));
        assert_eq!(state.offer(snap("one", 1, "peer-b")), OfferOutcome::Applied);
        assert_eq!(state.generation(), 1);
        assert_eq!(state.current().value, b"one");
    }

    #[test]
    fn offer_rejects_lower_clock_and_returns_winner() {
        let state = ClipboardState::new(PeerId::from("peer-a"));
        state.offer(snap("new", 4, "peer-b"));
        let outcome = state.offer(snap("old", 3, "peer-b"));
        assert_eq!(
            outcome,
            OfferOutcome::Rejected {
                winner: snap("new", 4, "peer-b")
            }
        );
        assert_eq!(state.generation(), 1);
    }

    #[test]
    fn arrival_order_does_not_change_final_snapshot() {
        let candidates = vec![
            snap("a1", 1, "peer-a"),
            snap("b1", 1, "peer-b"),
            snap("a5", 5, "peer-a"),
            snap("b5", 5, "peer-b"),
            snap("a7", 7, "peer-a"),
            snap("b3", 3, "peer-b"),
        ];

        for first in &candidates {
            for second in &candidates {
                let forward = ClipboardState::new(PeerId::from("observer"));
                forward.offer(first.clone());
                forward.offer(second.clone());

                let backward = ClipboardState::new(PeerId::from("observer"));
                backward.offer(second.clone());
                backward.offer(first.clone());

                assert_eq!(
                    forward.current(),
                    backward.current(),
                    "diverged for {first:?} / {second:?}"
                );
            }
        }
    }

    #[test]
    fn tie_break_scenario_does_not_oscillate() {
        let state_a = ClipboardState::new(PeerId::from("peer-a"));
        state_a.offer(snap("hello", 5, "peer-a"));

        let from_b = snap("world", 5, "peer-b");
        assert_eq!(state_a.offer(from_b.clone()), OfferOutcome::Applied);
        assert_eq!(state_a.current(), from_b);

        // Re-offering either value at the same clock is stale now.
        assert!(!state_a.offer(from_b.clone()).is_applied());
        assert!(!state_a.offer(snap("hello", 5, "peer-a")).is_applied());
        assert_eq!(state_a.current(), from_b);
    }

    #[test]
    fn record_local_stamps_past_current_clock() {
        let state = ClipboardState::new(PeerId::from("peer-a"));
        state.offer(snap("remote", 9, "peer-b"));

        let change = state.record_local(b"local".to_vec());
        assert_eq!(change.snapshot.logical_clock, 10);
        assert_eq!(change.snapshot.origin_id, PeerId::from("peer-a"));
        assert_eq!(change.source, ChangeSource::Local);
        assert_eq!(state.current(), change.snapshot);
    }

    #[test]
    fn change_since_reports_source_of_latest_change() {
        let state = ClipboardState::new(PeerId::from("peer-a"));
        assert!(state.change_since(0).is_none());

        state.offer(snap("remote", 1, "peer-b"));
        let change = state.change_since(0).expect("change");
        assert_eq!(change.source, ChangeSource::Peer);
        assert_eq!(change.generation, 1);
        assert!(state.change_since(1).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let state = ClipboardState::with_history_capacity(PeerId::from("peer-a"), 2);
        for clock in 1..=4 {
            state.offer(snap(&format!("v{clock}"), clock, "peer-b"));
        }
        let history = state.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].logical_clock, 2);
        assert_eq!(history[1].logical_clock, 3);
    }

    #[tokio::test]
    async fn subscribers_see_generation_changes() {
        let state = ClipboardState::new(PeerId::from("peer-a"));
        let mut rx = state.subscribe();
        state.record_local(b"x".to_vec());
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow(), 1);
    }
}
