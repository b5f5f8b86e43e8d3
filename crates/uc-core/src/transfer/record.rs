use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
    /// Announced, no chunk received yet.
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// Progress of one file transfer, keyed by its content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub fingerprint: Fingerprint,
    pub filename: String,
    pub size_bytes: u64,
    pub chunk_size: u32,
    pub total_chunks: u32,
    pub status: TransferStatus,
    pub chunks_received: BTreeSet<u32>,
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TransferRecord {
    /// Indices not received yet, in ascending order.
    pub fn missing_chunks(&self) -> Vec<u32> {
        let mut missing = Vec::new();
        let mut next = 0;
        for &index in self.chunks_received.range(..self.total_chunks) {
            missing.extend(next..index);
            next = index + 1;
        }
        missing.extend(next..self.total_chunks);
        missing
    }

    /// Byte length chunk `index` must have. Every chunk is full except the last.
    pub fn expected_chunk_len(&self, index: u32) -> u64 {
        let chunk_size = u64::from(self.chunk_size);
        let start = u64::from(index) * chunk_size;
        self.size_bytes.saturating_sub(start).min(chunk_size)
    }
}

/// Number of chunks needed for `size_bytes`, or `None` if it overflows `u32`.
pub fn chunk_count(size_bytes: u64, chunk_size: u32) -> Option<u32> {
    if chunk_size == 0 {
        return None;
    }
    u32::try_from(size_bytes.div_ceil(u64::from(chunk_size))).ok()
}
