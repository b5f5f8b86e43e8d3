//! Sync engine: outbound publishing, inbound application and file transfer.

pub(crate) mod engine;
mod error;
mod file_transfer;
mod inbound;
mod retry;

pub use engine::{PublishReport, SyncEngine, SyncEngineConfig};
pub use error::{InboundError, SyncError};
pub use file_transfer::FetchedTransfer;
pub use retry::{RetryExhausted, RetryPolicy};
