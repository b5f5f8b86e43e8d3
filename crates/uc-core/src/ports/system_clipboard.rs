//! System clipboard port - abstracts the platform clipboard

use anyhow::Result;

/// Platform clipboard access used by the poller.
///
/// Calls are expected to be quick. `read` yields `None` when the clipboard
/// holds nothing the sync engine can carry.
pub trait SystemClipboardPort: Send + Sync {
    fn read(&self) -> Result<Option<Vec<u8>>>;

    fn write(&self, value: &[u8]) -> Result<()>;
}
