use thiserror::Error;
use uc_core::{ChannelError, Endpoint, ErrorClass, Fingerprint, TransferError, TransferStatus};

/// Failures of outbound sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("publish failed after {attempts} attempts: {source}")]
    PublishFailed {
        attempts: u32,
        #[source]
        source: ChannelError,
    },

    #[error("chunk {chunk_index} of {fingerprint} failed after {attempts} attempts: {source}")]
    ChunkFailed {
        fingerprint: Fingerprint,
        chunk_index: u32,
        attempts: u32,
        #[source]
        source: ChannelError,
    },

    #[error("{endpoint} request failed after {attempts} attempts: {source}")]
    Channel {
        endpoint: Endpoint,
        attempts: u32,
        #[source]
        source: ChannelError,
    },

    #[error("peer answered {endpoint} with an unexpected {kind} response")]
    UnexpectedResponse {
        endpoint: Endpoint,
        kind: &'static str,
    },

    #[error("peer rejected transfer {fingerprint}: content hashed to {actual}")]
    Integrity {
        fingerprint: Fingerprint,
        actual: Fingerprint,
    },

    #[error("transfer {fingerprint} still misses chunks {missing:?} after repair")]
    Incomplete {
        fingerprint: Fingerprint,
        missing: Vec<u32>,
    },

    #[error("peer has transfer {fingerprint} as {status:?}, not complete")]
    RemoteNotComplete {
        fingerprint: Fingerprint,
        status: TransferStatus,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::PublishFailed { source, .. }
            | SyncError::ChunkFailed { source, .. }
            | SyncError::Channel { source, .. } => source.class(),
            SyncError::UnexpectedResponse { .. } | SyncError::Incomplete { .. } => {
                ErrorClass::ProtocolViolation
            }
            SyncError::RemoteNotComplete { .. } => ErrorClass::Informational,
            SyncError::Integrity { .. } => ErrorClass::Integrity,
            SyncError::Transfer(err) => err.class(),
        }
    }
}

/// Failures while serving a request from the peer.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("transfer {0} is not complete")]
    NotComplete(Fingerprint),
}

impl InboundError {
    pub fn class(&self) -> ErrorClass {
        match self {
            InboundError::Transfer(err) => err.class(),
            InboundError::NotComplete(_) => ErrorClass::ProtocolViolation,
        }
    }
}
