//! Long-running tasks driving the sync engine.
//!
//! Every loop takes a `watch::Receiver<bool>` shutdown signal and returns
//! once it flips or its sender is dropped.

mod evictor;
mod poller;
mod publisher;

use std::time::Duration;

/// Shortest period a loop ticks at. `tokio::time::interval` panics on zero.
const MIN_TICK: Duration = Duration::from_millis(1);

pub use evictor::TransferEvictor;
pub use poller::{ClipboardPoller, PollOutcome};
pub use publisher::{outbound_queue, OutboundPublisher, OutboundQueue};
