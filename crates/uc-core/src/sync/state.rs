use serde::{Deserialize, Serialize};

/// Clipboard synchronization phase
///
/// Design principle: pure type state machine with transition validation
/// only. Retries, backoff and cancellation live in the application layer
/// (uc-app).
///
/// State transitions:
///
/// ```text
/// Idle ──→ Polling ──→ Idle            (no local change)
///              └─────→ Publishing ──→ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipboardSyncPhase {
    /// Waiting for the next poll tick
    #[default]
    Idle,

    /// Reading the system clipboard
    Polling,

    /// Delivering a local change to the peer
    Publishing,
}

impl ClipboardSyncPhase {
    pub fn start_polling(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Polling),
            _ => None,
        }
    }

    /// A local change was found while polling.
    pub fn start_publishing(self) -> Option<Self> {
        match self {
            Self::Polling | Self::Idle => Some(Self::Publishing),
            _ => None,
        }
    }

    /// Poll or publish finished, whatever the outcome.
    pub fn finish(self) -> Self {
        Self::Idle
    }
}

/// File transfer phase, tracked per in-flight request.
///
/// ```text
/// Idle ──→ AwaitingAck ──→ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferSyncPhase {
    #[default]
    Idle,

    /// A begin, chunk or finalize request is on the wire
    AwaitingAck,
}

impl TransferSyncPhase {
    pub fn send(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::AwaitingAck),
            Self::AwaitingAck => None,
        }
    }

    pub fn on_ack(self) -> Self {
        Self::Idle
    }
}
