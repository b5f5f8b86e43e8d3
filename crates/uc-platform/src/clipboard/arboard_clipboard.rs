use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use uc_core::ports::SystemClipboardPort;

/// Text clipboard backed by `arboard`.
///
/// Non-text content reads as `None`, so images or file lists copied locally
/// are simply not synced.
pub struct ArboardClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| anyhow!(e)).context("open system clipboard")?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }
}

impl SystemClipboardPort for ArboardClipboard {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text.into_bytes())),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(anyhow!(e)).context("read clipboard text"),
        }
    }

    fn write(&self, value: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(value).into_owned();
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard
            .set_text(text)
            .map_err(|e| anyhow!(e))
            .context("write clipboard text")
    }
}
