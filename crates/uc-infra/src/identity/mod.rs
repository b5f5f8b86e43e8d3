//! Local peer identity.
//!
//! A fixed id from the config file wins and is never written to disk.
//! Otherwise the id generated on first start is kept in `peer.id` and reused.

mod storage;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use uc_core::ports::PeerIdentityPort;
use uc_core::PeerId;

use storage::{check_peer_id, PeerIdFile};

pub struct FilePeerIdentity {
    peer_id: PeerId,
}

impl FilePeerIdentity {
    /// Load the persisted id, or generate and persist a new one.
    ///
    /// Fails on any I/O error: the node must not start without an identity.
    pub fn load_or_create(config_dir: &Path) -> Result<Self> {
        let file = PeerIdFile::in_dir(config_dir);
        if let Some(peer_id) = file.read()? {
            return Ok(Self { peer_id });
        }
        let peer_id = PeerId::generate();
        file.write(&peer_id)?;
        info!(peer_id = %peer_id, path = %file.path().display(), "Generated new peer id");
        Ok(Self { peer_id })
    }

    /// Use `configured` when set, otherwise [`Self::load_or_create`].
    pub fn resolve(configured: Option<&str>, config_dir: &Path) -> Result<Self> {
        match configured.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                check_peer_id(id).context("Invalid [identity] peer_id")?;
                Ok(Self {
                    peer_id: PeerId::from(id),
                })
            }
            None => Self::load_or_create(config_dir),
        }
    }
}

impl PeerIdentityPort for FilePeerIdentity {
    fn current_peer_id(&self) -> PeerId {
        self.peer_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_start_generates_and_keeps_an_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = FilePeerIdentity::load_or_create(dir.path()).expect("first start");
        let second = FilePeerIdentity::load_or_create(dir.path()).expect("restart");

        uuid::Uuid::parse_str(first.current_peer_id().as_str()).expect("peer id is a UUID");
        assert_eq!(first.current_peer_id(), second.current_peer_id());
    }

    #[test]
    fn configured_id_wins_and_is_not_persisted() {
        let dir = tempfile::tempdir().expect("temp dir");
        let identity = FilePeerIdentity::resolve(Some(" desk-1 "), dir.path()).expect("resolve");

        assert_eq!(identity.current_peer_id(), PeerId::from("desk-1"));
        assert!(PeerIdFile::in_dir(dir.path()).read().expect("read").is_none());
    }

    #[test]
    fn blank_configured_id_falls_back_to_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        FilePeerIdentity::resolve(Some("  "), dir.path()).expect("resolve");

        assert!(PeerIdFile::in_dir(dir.path()).read().expect("read").is_some());
    }

    #[test]
    fn configured_id_with_spaces_is_refused() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = FilePeerIdentity::resolve(Some("my desk"), dir.path());

        let err = result.err().expect("spaces are refused");
        assert!(format!("{err:#}").contains("[identity] peer_id"));
    }
}
