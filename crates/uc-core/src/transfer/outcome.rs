use serde::{Deserialize, Serialize};

use super::TransferRecord;
use crate::ids::Fingerprint;

/// Answer to a single chunk. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkOutcome {
    /// Filled the lowest missing index.
    Ack,
    /// Stored ahead of a gap.
    OutOfOrder,
    /// Already present; nothing changed.
    Duplicate,
}

/// Why a begin was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeginRejection {
    DuplicateTransfer,
    AlreadyComplete,
    /// The announced chunk size is outside what this node accepts. The
    /// sender may announce again without one to use the receiver's default.
    UnsupportedChunkSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Complete(TransferRecord),
    Incomplete(IncompleteReason),
}

/// A finalize answer plus whether this call moved the record to Complete.
///
/// Repeated finalizes of a finished transfer report `newly_completed: false`,
/// so side effects of completion run once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub outcome: FinalizeOutcome,
    pub newly_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    /// Some declared chunks never arrived. The transfer stays resumable.
    MissingChunks(Vec<u32>),
    /// Reassembled content hashed to something else. The transfer is failed.
    IntegrityMismatch {
        expected: Fingerprint,
        actual: Fingerprint,
    },
}

/// Answer to a transfer announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    Accepted(TransferRecord),
    Rejected(BeginRejection),
}
