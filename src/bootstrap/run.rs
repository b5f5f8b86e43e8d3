use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uc_app::{outbound_queue, ClipboardPoller, OutboundPublisher, SyncEngine, TransferEvictor};
use uc_core::ports::{ReceivedFileStorePort, SystemClipboardPort};
use uc_core::{AppConfig, ClipboardSnapshot, Fingerprint, TransferRecord};
use uc_infra::FsReceivedFileStore;
use uc_platform::{ArboardClipboard, PeerHttpServer};

use super::config::{default_config_path, load_or_default};
use super::wiring::{build_engine, resolve_shared_dir};
use crate::cli::{Cli, Command};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Load config, wire the engine and execute the selected command.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = load_or_default(&config_path)?;
    cli.apply_overrides(&mut config);

    let identity_dir = uc_infra::fs::config_dir()?;
    let engine = build_engine(&config, &identity_dir)?;

    match cli.command() {
        Command::Run => serve(config, engine).await,
        Command::Send { file } => send_file(&engine, &file).await.map(|_| ()),
        Command::Clipboard => {
            let snapshot = fetch_clipboard(&engine).await?;
            match snapshot.text() {
                Some(text) if !text.is_empty() => println!("{text}"),
                Some(_) => println!("(peer clipboard is empty)"),
                None => println!("(peer clipboard holds {} non-text bytes)", snapshot.value.len()),
            }
            Ok(())
        }
        Command::Fetch { fingerprint, out } => {
            let path = fetch_file(&engine, &config, &fingerprint, out).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Run every background task until Ctrl-C.
pub async fn serve(config: AppConfig, engine: Arc<SyncEngine>) -> Result<()> {
    let clipboard: Arc<dyn SystemClipboardPort> = Arc::new(ArboardClipboard::new()?);
    let server = PeerHttpServer::bind(&config.server.bind, engine.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (queue, queue_rx) = outbound_queue();
    let mut tasks = JoinSet::new();

    let server_shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        if let Err(err) = server.run(server_shutdown).await {
            error!(error = %format!("{err:#}"), "HTTP server stopped");
        }
    });

    let poller = ClipboardPoller::new(
        engine.clone(),
        clipboard,
        queue,
        config.sync.poll_interval(),
    );
    tasks.spawn(poller.run(shutdown_rx.clone()));

    let publisher = OutboundPublisher::new(engine.clone(), queue_rx);
    tasks.spawn(publisher.run(shutdown_rx.clone()));

    let evictor = TransferEvictor::new(
        engine.ledger().clone(),
        config.transfer.retention(),
        config.transfer.stale_after(),
        config.transfer.evict_interval(),
    );
    tasks.spawn(evictor.run(shutdown_rx.clone()));

    // The peer may not be up yet; it then introduces itself on its own start.
    let handshake_engine = engine.clone();
    let mut handshake_shutdown = shutdown_rx;
    tasks.spawn(async move {
        tokio::select! {
            _ = handshake_shutdown.changed() => {}
            result = handshake_engine.handshake() => match result {
                Ok(peer_id) => info!(%peer_id, "Connected to peer"),
                Err(err) => warn!(error = %err, "Handshake failed, waiting for the peer to connect"),
            },
        }
    });

    info!(bind = %config.server.bind, peer = %config.peer.address, "UniClipboard Share running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    // Receivers are still alive in the tasks.
    let _ = shutdown_tx.send(true);

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain(&mut tasks))
        .await
        .is_err()
    {
        warn!(
            timeout_ms = SHUTDOWN_TIMEOUT.as_millis() as u64,
            remaining = tasks.len(),
            "Tasks did not stop in time, aborting"
        );
        tasks.abort_all();
    }

    info!("Stopped");
    Ok(())
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            warn!(error = %err, "Task ended abnormally");
        }
    }
}

/// Send `path` to the peer and wait until it is stored on the other side.
pub async fn send_file(engine: &SyncEngine, path: &Path) -> Result<TransferRecord> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file name: {}", path.display()))?
        .to_string();
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    async {
        if let Err(err) = engine.handshake().await {
            warn!(error = %err, "Handshake failed, sending anyway");
        }
        let record = engine
            .publish_file(&filename, Bytes::from(content))
            .await
            .context("File transfer failed")?;
        info!(
            fingerprint = %record.fingerprint,
            size_bytes = record.size_bytes,
            chunks = record.total_chunks,
            "File sent"
        );
        Ok::<_, anyhow::Error>(record)
    }
    .instrument(info_span!("send_file", file = %path.display()))
    .await
}

/// Pull the peer's clipboard; a newer value is adopted locally.
pub async fn fetch_clipboard(engine: &SyncEngine) -> Result<ClipboardSnapshot> {
    let snapshot = engine
        .fetch_peer_clipboard()
        .await
        .context("Failed to fetch the peer clipboard")?;
    info!(
        logical_clock = snapshot.logical_clock,
        origin = %snapshot.origin_id,
        bytes = snapshot.value.len(),
        "Peer clipboard fetched"
    );
    Ok(snapshot)
}

/// Download a completed transfer. Without `out` it lands in the shared folder
/// under a free name, like a received file.
pub async fn fetch_file(
    engine: &SyncEngine,
    config: &AppConfig,
    fingerprint: &str,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    let fingerprint = Fingerprint::parse(fingerprint)
        .with_context(|| format!("Not a content fingerprint: {fingerprint}"))?;

    async {
        let fetched = engine
            .fetch_transfer(&fingerprint)
            .await
            .context("Failed to fetch transfer")?;
        let path = match out {
            Some(path) => {
                tokio::fs::write(&path, &fetched.content)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                path
            }
            None => {
                let store = FsReceivedFileStore::new(resolve_shared_dir(&config.transfer.shared_dir)?);
                store.store(&fetched.record, fetched.content.clone()).await?
            }
        };
        info!(
            filename = %fetched.record.filename,
            size_bytes = fetched.content.len() as u64,
            path = %path.display(),
            "File fetched"
        );
        Ok::<_, anyhow::Error>(path)
    }
    .instrument(info_span!("fetch_file", fingerprint = %fingerprint.short()))
    .await
}
