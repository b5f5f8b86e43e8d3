use super::{chunk_count, TransferError};

/// Smallest chunk a peer may announce, unless the local chunk size is smaller.
pub const MIN_CHUNK_SIZE: u32 = 4 * 1024;
/// Upper bound on chunks per transfer. Keeps the received-index set and
/// missing-chunk lists small whatever the announcement says.
pub const MAX_TOTAL_CHUNKS: u32 = 1 << 20;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Bounds checked against an announcement before any state is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub min_chunk_size: u32,
    pub max_chunk_size: u32,
    pub max_total_chunks: u32,
    pub max_size_bytes: u64,
}

impl TransferLimits {
    /// Limits for a node splitting its own files into `chunk_size` chunks.
    ///
    /// The local chunk size is the largest accepted. It is what the HTTP
    /// body limit is sized for.
    pub fn for_chunk_size(chunk_size: u32) -> Self {
        Self {
            min_chunk_size: MIN_CHUNK_SIZE.min(chunk_size).max(1),
            max_chunk_size: chunk_size,
            max_total_chunks: MAX_TOTAL_CHUNKS,
            max_size_bytes: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_size_bytes(self, max_size_bytes: u64) -> Self {
        Self {
            max_size_bytes,
            ..self
        }
    }

    pub fn accepts_chunk_size(&self, chunk_size: u32) -> bool {
        (self.min_chunk_size..=self.max_chunk_size).contains(&chunk_size)
    }

    /// Number of chunks for an accepted announcement.
    pub fn check(&self, size_bytes: u64, chunk_size: u32) -> Result<u32, TransferError> {
        if !self.accepts_chunk_size(chunk_size) {
            return Err(TransferError::InvalidAnnouncement(format!(
                "chunk size {chunk_size} outside {}..={}",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if size_bytes > self.max_size_bytes {
            return Err(TransferError::InvalidAnnouncement(format!(
                "{size_bytes} bytes exceeds the {} byte limit",
                self.max_size_bytes
            )));
        }
        match chunk_count(size_bytes, chunk_size) {
            Some(total) if total <= self.max_total_chunks => Ok(total),
            _ => Err(TransferError::InvalidAnnouncement(format!(
                "{size_bytes} bytes in chunks of {chunk_size} needs more than {} chunks",
                self.max_total_chunks
            ))),
        }
    }
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self::for_chunk_size(super::DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_chunk_size_bounds_the_range() {
        let limits = TransferLimits::for_chunk_size(1024 * 1024);
        assert!(limits.accepts_chunk_size(MIN_CHUNK_SIZE));
        assert!(limits.accepts_chunk_size(1024 * 1024));
        assert!(!limits.accepts_chunk_size(MIN_CHUNK_SIZE - 1));
        assert!(!limits.accepts_chunk_size(1024 * 1024 + 1));

        let tiny = TransferLimits::for_chunk_size(4);
        assert!(tiny.accepts_chunk_size(4));
        assert!(!tiny.accepts_chunk_size(0));
    }

    #[test]
    fn size_and_chunk_count_are_capped() {
        let limits = TransferLimits {
            min_chunk_size: 1,
            max_chunk_size: 16,
            max_total_chunks: 8,
            max_size_bytes: 1_000,
        };
        assert_eq!(limits.check(128, 16), Ok(8));
        assert!(matches!(
            limits.check(129, 16),
            Err(TransferError::InvalidAnnouncement(_))
        ));
        assert!(matches!(
            limits.check(1_001, 16),
            Err(TransferError::InvalidAnnouncement(_))
        ));
    }
}
