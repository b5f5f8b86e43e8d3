//! The local peer id on disk: a single line in `<config_dir>/peer.id`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use uc_core::PeerId;

const FILE_NAME: &str = "peer.id";
const MAX_PEER_ID_LEN: usize = 128;

/// Peer ids go into every snapshot and break clock ties, so they stay short
/// and free of whitespace.
pub(crate) fn check_peer_id(id: &str) -> Result<()> {
    ensure!(!id.is_empty(), "peer id is empty");
    ensure!(
        id.len() <= MAX_PEER_ID_LEN,
        "peer id is longer than {MAX_PEER_ID_LEN} bytes"
    );
    ensure!(
        !id.chars().any(|c| c.is_whitespace() || c.is_control()),
        "peer id {id:?} contains whitespace or control characters"
    );
    Ok(())
}

pub(crate) struct PeerIdFile {
    path: PathBuf,
}

impl PeerIdFile {
    pub(crate) fn in_dir(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(FILE_NAME),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing has been written yet.
    pub(crate) fn read(&self) -> Result<Option<PeerId>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let id = content.trim();
        if id.is_empty() {
            return Ok(None);
        }
        check_peer_id(id).with_context(|| format!("Unusable peer id in {}", self.path.display()))?;
        Ok(Some(PeerId::from(id)))
    }

    /// A crash mid-write leaves the previous file in place.
    pub(crate) fn write(&self, peer_id: &PeerId) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let partial = self.path.with_extension("id.partial");
        std::fs::write(&partial, format!("{peer_id}\n"))
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        std::fs::rename(&partial, &self.path)
            .with_context(|| format!("Failed to move peer id into {}", self.path.display()))
    }
}
