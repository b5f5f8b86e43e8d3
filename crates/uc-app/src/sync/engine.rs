use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uc_core::config::AppConfig;
use uc_core::ports::{PeerChannelPort, ReceivedFileStorePort};
use uc_core::{
    ClipboardSnapshot, ClipboardState, Endpoint, OfferOutcome, PeerId, PeerRequest, PeerResponse,
    TransferLedger, TransferSyncPhase,
};

use super::retry::{RetryExhausted, RetryPolicy};
use super::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEngineConfig {
    pub retry: RetryPolicy,
    pub chunk_size: u32,
    /// Sends per chunk, on the same backoff schedule as `retry`.
    pub chunk_attempts: u32,
}

impl SyncEngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.retry),
            chunk_size: config.transfer.chunk_size_bytes,
            chunk_attempts: config.transfer.chunk_attempts.max(1),
        }
    }
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// How a publish ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    Delivered { attempts: u32 },
    /// The peer held a newer value. It has been applied locally.
    PeerWon {
        winner: ClipboardSnapshot,
        attempts: u32,
    },
    /// The snapshot came from the peer and is not sent back.
    SuppressedEcho,
    /// A newer local change arrived while backing off.
    Superseded,
}

/// Orchestrates clipboard and file sync with the single remote peer.
///
/// Holds no clipboard value of its own: ordering decisions are made by
/// [`ClipboardState`], transfer bookkeeping by [`TransferLedger`].
pub struct SyncEngine {
    pub(super) state: Arc<ClipboardState>,
    pub(super) ledger: Arc<TransferLedger>,
    pub(super) channel: Arc<dyn PeerChannelPort>,
    pub(super) received_files: Option<Arc<dyn ReceivedFileStorePort>>,
    pub(super) config: SyncEngineConfig,
    remote_peer: OnceLock<PeerId>,
    republish_requested: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        state: Arc<ClipboardState>,
        ledger: Arc<TransferLedger>,
        channel: Arc<dyn PeerChannelPort>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            state,
            ledger,
            channel,
            received_files: None,
            config,
            remote_peer: OnceLock::new(),
            republish_requested: AtomicBool::new(false),
        }
    }

    /// Hand completed inbound files to `store`.
    pub fn with_received_files(mut self, store: Arc<dyn ReceivedFileStorePort>) -> Self {
        self.received_files = Some(store);
        self
    }

    pub fn state(&self) -> &Arc<ClipboardState> {
        &self.state
    }

    pub fn ledger(&self) -> &Arc<TransferLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub fn local_peer(&self) -> &PeerId {
        self.state.local_peer()
    }

    /// Peer id learned at handshake, if any.
    pub fn remote_peer(&self) -> Option<&PeerId> {
        self.remote_peer.get()
    }

    /// Send a local snapshot to the peer.
    ///
    /// Every transient failure is followed by its backoff delay, the last one
    /// included, before `PublishFailed` is reported. A newer local change
    /// observed during backoff ends the publish early.
    pub async fn publish(&self, local: ClipboardSnapshot) -> Result<PublishReport, SyncError> {
        let span = info_span!(
            "usecase.sync.publish",
            logical_clock = local.logical_clock,
            origin = %local.origin_id,
        );

        async move {
            if &local.origin_id != self.state.local_peer() {
                debug!("Snapshot originated at the peer, not publishing it back");
                return Ok(PublishReport::SuppressedEcho);
            }
            if self.is_superseded(&local) {
                debug!("Snapshot superseded before first attempt");
                return Ok(PublishReport::Superseded);
            }

            let mut generations = self.state.subscribe();
            let retry = self.config.retry;
            let mut attempt = 0;

            loop {
                attempt += 1;
                match self
                    .channel
                    .send(PeerRequest::PushClipboard(local.clone()))
                    .await
                {
                    Ok(PeerResponse::Offer(OfferOutcome::Applied)) => {
                        info!(attempts = attempt, "Clipboard delivered to peer");
                        return Ok(PublishReport::Delivered { attempts: attempt });
                    }
                    Ok(PeerResponse::Offer(OfferOutcome::Rejected { winner })) => {
                        info!(
                            winner_clock = winner.logical_clock,
                            winner_origin = %winner.origin_id,
                            "Peer holds a newer clipboard value, converging to it"
                        );
                        self.state.offer(winner.clone());
                        return Ok(PublishReport::PeerWon {
                            winner,
                            attempts: attempt,
                        });
                    }
                    Ok(other) => {
                        return Err(SyncError::UnexpectedResponse {
                            endpoint: Endpoint::Clipboard,
                            kind: other.kind(),
                        })
                    }
                    Err(err) if err.is_transient() => {
                        let delay = retry.delay_for(attempt);
                        warn!(
                            attempt,
                            max_attempts = retry.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Publish attempt failed, backing off"
                        );
                        if self.backoff_or_superseded(delay, &local, &mut generations).await {
                            debug!(attempt, "Publish abandoned for a newer snapshot");
                            return Ok(PublishReport::Superseded);
                        }
                        if attempt >= retry.max_attempts {
                            return Err(SyncError::PublishFailed {
                                attempts: attempt,
                                source: err,
                            });
                        }
                    }
                    Err(err) => {
                        return Err(SyncError::PublishFailed {
                            attempts: attempt,
                            source: err,
                        })
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Offer a snapshot received from the peer.
    pub fn apply(&self, remote: ClipboardSnapshot) -> OfferOutcome {
        let span = info_span!(
            "usecase.sync.apply",
            logical_clock = remote.logical_clock,
            origin = %remote.origin_id,
        );
        let _enter = span.enter();

        let outcome = self.state.offer(remote);
        match &outcome {
            OfferOutcome::Applied => debug!("Remote clipboard applied"),
            OfferOutcome::Rejected { winner } => debug!(
                winner_clock = winner.logical_clock,
                "Remote clipboard rejected, local value wins"
            ),
        }
        outcome
    }

    /// Exchange peer ids with the remote node.
    pub async fn handshake(&self) -> Result<PeerId, SyncError> {
        let request = PeerRequest::Handshake {
            peer_id: self.local_peer().clone(),
        };

        async move {
            match self.call(request).await? {
                PeerResponse::Identity { peer_id } => {
                    self.note_remote_peer(peer_id.clone());
                    Ok(peer_id)
                }
                other => Err(SyncError::UnexpectedResponse {
                    endpoint: Endpoint::Identity,
                    kind: other.kind(),
                }),
            }
        }
        .instrument(info_span!("usecase.sync.handshake"))
        .await
    }

    /// Pull the peer's current clipboard and offer it to local state.
    ///
    /// Returns the peer's snapshot whether or not it won locally.
    pub async fn fetch_peer_clipboard(&self) -> Result<ClipboardSnapshot, SyncError> {
        async move {
            match self.call(PeerRequest::FetchClipboard).await? {
                PeerResponse::Clipboard(snapshot) => {
                    let outcome = self.apply(snapshot.clone());
                    info!(
                        logical_clock = snapshot.logical_clock,
                        origin = %snapshot.origin_id,
                        applied = outcome.is_applied(),
                        "Fetched peer clipboard"
                    );
                    Ok(snapshot)
                }
                other => Err(SyncError::UnexpectedResponse {
                    endpoint: Endpoint::Clipboard,
                    kind: other.kind(),
                }),
            }
        }
        .instrument(info_span!("usecase.sync.fetch_peer_clipboard"))
        .await
    }

    /// Ask the poller to re-queue the current value on its next cycle.
    pub fn request_republish(&self) {
        self.republish_requested.store(true, Ordering::Release);
    }

    pub fn take_republish_request(&self) -> bool {
        self.republish_requested.swap(false, Ordering::AcqRel)
    }

    /// First id wins for the session.
    pub(super) fn note_remote_peer(&self, peer_id: PeerId) {
        match self.remote_peer.get() {
            Some(known) if known != &peer_id => warn!(
                known = %known,
                announced = %peer_id,
                "Peer announced a different id, keeping the first one"
            ),
            Some(_) => {}
            None => {
                if self.remote_peer.set(peer_id.clone()).is_ok() {
                    info!(remote_peer = %peer_id, "Peer identified");
                }
            }
        }
    }

    /// One control request on the clipboard retry budget.
    pub(super) async fn call(&self, request: PeerRequest) -> Result<PeerResponse, SyncError> {
        let endpoint = request.endpoint();
        self.send_with_retry(request, self.config.retry.max_attempts)
            .await
            .map_err(|exhausted| SyncError::Channel {
                endpoint,
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }

    /// Send up to `max_attempts` times while the errors are transient.
    pub(super) async fn send_with_retry(
        &self,
        request: PeerRequest,
        max_attempts: u32,
    ) -> Result<PeerResponse, RetryExhausted> {
        let endpoint = request.endpoint();
        let retry = self.config.retry;
        let mut phase = TransferSyncPhase::Idle;
        let mut attempt = 0;

        loop {
            attempt += 1;
            phase = phase.send().unwrap_or(TransferSyncPhase::AwaitingAck);
            trace!(%endpoint, attempt, ?phase, "Request sent");
            let result = self.channel.send(request.clone()).await;
            phase = phase.on_ack();

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        %endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Request failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    })
                }
            }
        }
    }

    fn is_superseded(&self, local: &ClipboardSnapshot) -> bool {
        self.state.current().supersedes(local)
    }

    /// Sleep for `delay`, returning early with `true` once `local` is superseded.
    async fn backoff_or_superseded(
        &self,
        delay: Duration,
        local: &ClipboardSnapshot,
        generations: &mut watch::Receiver<u64>,
    ) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = generations.changed() => {
                    if changed.is_err() {
                        (&mut sleep).await;
                        return false;
                    }
                    if self.is_superseded(local) {
                        return true;
                    }
                }
            }
        }
    }
}
