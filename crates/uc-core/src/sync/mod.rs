//! Sync phase state machines.

pub mod state;

pub use state::{ClipboardSyncPhase, TransferSyncPhase};
