use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::transfer::TransferRecord;

/// Destination for files that finished an inbound transfer.
#[async_trait]
pub trait ReceivedFileStorePort: Send + Sync {
    /// Persist verified content and return where it landed.
    async fn store(&self, record: &TransferRecord, content: Bytes) -> Result<PathBuf>;
}
