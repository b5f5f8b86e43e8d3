//! File transfer bookkeeping.

mod error;
mod ledger;
mod limits;
mod outcome;
mod record;

pub use error::TransferError;
pub use ledger::{TransferLedger, DEFAULT_CHUNK_SIZE};
pub use limits::{TransferLimits, DEFAULT_MAX_FILE_SIZE, MAX_TOTAL_CHUNKS, MIN_CHUNK_SIZE};
pub use outcome::{
    BeginOutcome, BeginRejection, ChunkOutcome, FinalizeOutcome, Finalized, IncompleteReason,
};
pub use record::{chunk_count, TransferRecord, TransferStatus};
