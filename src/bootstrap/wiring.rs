//! Builds the sync engine from configuration.
//!
//! Everything that touches the OS clipboard is left to [`super::run`], so
//! the engine can be built in tests and in `send` mode without a display.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use uc_app::{SyncEngine, SyncEngineConfig};
use uc_core::ports::{PeerIdentityPort, ReceivedFileStorePort};
use uc_core::{AppConfig, ClipboardState, TransferLedger, TransferLimits};
use uc_infra::{FilePeerIdentity, FsReceivedFileStore, SystemClock};
use uc_platform::HttpPeerChannel;

/// `identity_dir` holds the persisted peer id.
pub fn build_engine(config: &AppConfig, identity_dir: &Path) -> Result<Arc<SyncEngine>> {
    let identity = FilePeerIdentity::resolve(config.identity.peer_id.as_deref(), identity_dir)
        .context("Failed to resolve local peer id")?;
    let local_peer = identity.current_peer_id();

    let state = Arc::new(ClipboardState::with_history_capacity(
        local_peer.clone(),
        config.sync.history_capacity,
    ));
    let limits = TransferLimits::for_chunk_size(config.transfer.chunk_size_bytes)
        .with_max_size_bytes(config.transfer.max_file_size_bytes);
    let ledger = Arc::new(
        TransferLedger::new(Arc::new(SystemClock), config.transfer.chunk_size_bytes)
            .with_limits(limits),
    );
    let channel = Arc::new(
        HttpPeerChannel::new(&config.peer.address, config.peer.request_timeout())
            .context("Failed to create peer channel")?,
    );

    let shared_dir = resolve_shared_dir(&config.transfer.shared_dir)?;
    let received_files: Arc<dyn ReceivedFileStorePort> =
        Arc::new(FsReceivedFileStore::new(shared_dir.clone()));

    info!(
        peer_id = %local_peer,
        peer_address = %config.peer.address,
        shared_dir = %shared_dir.display(),
        "Sync engine wired"
    );

    let engine = SyncEngine::new(state, ledger, channel, SyncEngineConfig::from_app_config(config))
        .with_received_files(received_files);
    Ok(Arc::new(engine))
}

pub(super) fn resolve_shared_dir(configured: &Path) -> Result<PathBuf> {
    if configured.as_os_str().is_empty() {
        uc_infra::fs::default_shared_dir()
    } else {
        Ok(configured.to_path_buf())
    }
}
