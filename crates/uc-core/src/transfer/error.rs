use thiserror::Error;

use super::TransferStatus;
use crate::error::ErrorClass;
use crate::ids::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("transfer {0} is already in progress")]
    DuplicateTransfer(Fingerprint),

    #[error("transfer {0} is already complete")]
    AlreadyComplete(Fingerprint),

    #[error("unknown transfer {0}")]
    UnknownTransfer(Fingerprint),

    #[error("transfer {fingerprint} is {status:?} and no longer accepts changes")]
    NotActive {
        fingerprint: Fingerprint,
        status: TransferStatus,
    },

    #[error("chunk {index} is out of range, transfer has {total} chunks")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("chunk {index} has {actual} bytes, expected {expected}")]
    ChunkSizeMismatch { index: u32, expected: u64, actual: u64 },

    #[error("invalid transfer announcement: {0}")]
    InvalidAnnouncement(String),
}

impl TransferError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::DuplicateTransfer(_) | TransferError::AlreadyComplete(_) => {
                ErrorClass::Informational
            }
            _ => ErrorClass::ProtocolViolation,
        }
    }
}
