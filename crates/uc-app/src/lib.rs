//! UniClipboard Share Application Layer
//!
//! This crate contains the sync engine and the runtime loops that drive it.

pub mod runtime;
pub mod sync;

pub use runtime::{outbound_queue, ClipboardPoller, OutboundPublisher, TransferEvictor};
pub use sync::{
    FetchedTransfer, PublishReport, RetryPolicy, SyncEngine, SyncEngineConfig, SyncError,
};
