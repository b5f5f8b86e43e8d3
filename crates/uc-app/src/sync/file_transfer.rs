use bytes::Bytes;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uc_core::network::{TransferAnnouncement, TransferChunk};
use uc_core::transfer::{BeginOutcome, BeginRejection, FinalizeOutcome, IncompleteReason};
use uc_core::{
    Endpoint, Fingerprint, PeerRequest, PeerResponse, TransferError, TransferRecord,
    TransferStatus, TransferSyncPhase,
};

use super::{RetryExhausted, SyncEngine, SyncError};

/// A completed transfer pulled from the peer, already verified against its
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTransfer {
    pub record: TransferRecord,
    pub content: Bytes,
}

impl SyncEngine {
    /// Send a file to the peer in fixed-size chunks.
    ///
    /// The transfer is announced on both ledgers first. If the peer already
    /// has an active record for the same content, only its missing chunks are
    /// sent. Returns the local record once the peer verified the content.
    pub async fn publish_file(
        &self,
        filename: &str,
        content: Bytes,
    ) -> Result<TransferRecord, SyncError> {
        let fingerprint = Fingerprint::of(&content);
        let span = info_span!(
            "usecase.sync.publish_file",
            filename,
            size_bytes = content.len() as u64,
            fingerprint = %fingerprint.short(),
        );

        async move {
            let chunk_size = self.config.chunk_size;
            match self.ledger.begin_with_chunk_size(
                filename,
                content.len() as u64,
                fingerprint.clone(),
                chunk_size,
            ) {
                Ok(record) => debug!(total_chunks = record.total_chunks, "Transfer announced locally"),
                Err(TransferError::AlreadyComplete(_)) => {
                    debug!("Content already sent once, announcing it again")
                }
                Err(err) => return Err(err.into()),
            }

            match self
                .stream_to_peer(filename, &fingerprint, &content)
                .await
            {
                Ok(()) => self.complete_locally(filename, &fingerprint, &content),
                Err(err) => {
                    if let Err(mark_err) = self.ledger.mark_failed(&fingerprint, &err.to_string())
                    {
                        debug!(error = %mark_err, "Local record not marked failed");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Chunks are cut to the size on the peer's record, which is the one its
    /// ledger validates against.
    async fn stream_to_peer(
        &self,
        filename: &str,
        fingerprint: &Fingerprint,
        content: &Bytes,
    ) -> Result<(), SyncError> {
        // Stop-and-wait: the next request goes out only after the previous answer.
        let mut phase = TransferSyncPhase::Idle;
        let mut announced_chunk_size = Some(self.config.chunk_size);

        let (chunk_size, mut pending) = loop {
            let begin = PeerRequest::BeginTransfer(TransferAnnouncement {
                filename: filename.to_string(),
                size_bytes: content.len() as u64,
                fingerprint: fingerprint.clone(),
                chunk_size: announced_chunk_size,
            });
            match self.request(&mut phase, begin).await? {
                PeerResponse::Begin(BeginOutcome::Accepted(record)) => {
                    break (record.chunk_size, (0..record.total_chunks).collect::<Vec<_>>());
                }
                PeerResponse::Begin(BeginOutcome::Rejected(BeginRejection::AlreadyComplete)) => {
                    info!("Peer already holds this content");
                    return Ok(());
                }
                PeerResponse::Begin(BeginOutcome::Rejected(BeginRejection::DuplicateTransfer)) => {
                    let record = self.remote_status(&mut phase, fingerprint).await?;
                    let missing = record.missing_chunks();
                    info!(
                        received = record.chunks_received.len(),
                        missing = missing.len(),
                        chunk_size = record.chunk_size,
                        "Resuming transfer the peer already started"
                    );
                    break (record.chunk_size, missing);
                }
                PeerResponse::Begin(BeginOutcome::Rejected(
                    BeginRejection::UnsupportedChunkSize,
                )) if announced_chunk_size.is_some() => {
                    info!(
                        chunk_size = self.config.chunk_size,
                        "Peer refused our chunk size, announcing with its default"
                    );
                    announced_chunk_size = None;
                }
                other => {
                    return Err(SyncError::UnexpectedResponse {
                        endpoint: Endpoint::TransferBegin,
                        kind: other.kind(),
                    })
                }
            }
        };

        let mut repaired = false;
        loop {
            for &chunk_index in &pending {
                let data = chunk_of(content, chunk_index, chunk_size);
                self.send_chunk(&mut phase, fingerprint, chunk_index, data)
                    .await?;
            }

            let finalize = PeerRequest::FinalizeTransfer {
                fingerprint: fingerprint.clone(),
            };
            match self.request(&mut phase, finalize).await? {
                PeerResponse::Finalize(FinalizeOutcome::Complete(_)) => {
                    info!(chunks_sent = pending.len(), "Peer verified transfer");
                    return Ok(());
                }
                PeerResponse::Finalize(FinalizeOutcome::Incomplete(
                    IncompleteReason::MissingChunks(missing),
                )) if !repaired => {
                    warn!(missing = missing.len(), "Peer reports missing chunks, resending");
                    repaired = true;
                    pending = missing;
                }
                PeerResponse::Finalize(FinalizeOutcome::Incomplete(
                    IncompleteReason::MissingChunks(missing),
                )) => {
                    return Err(SyncError::Incomplete {
                        fingerprint: fingerprint.clone(),
                        missing,
                    })
                }
                PeerResponse::Finalize(FinalizeOutcome::Incomplete(
                    IncompleteReason::IntegrityMismatch { actual, .. },
                )) => {
                    return Err(SyncError::Integrity {
                        fingerprint: fingerprint.clone(),
                        actual,
                    })
                }
                other => {
                    return Err(SyncError::UnexpectedResponse {
                        endpoint: Endpoint::TransferFinalize,
                        kind: other.kind(),
                    })
                }
            }
        }
    }

    async fn send_chunk(
        &self,
        phase: &mut TransferSyncPhase,
        fingerprint: &Fingerprint,
        chunk_index: u32,
        data: Bytes,
    ) -> Result<(), SyncError> {
        let request = PeerRequest::SendChunk(TransferChunk {
            fingerprint: fingerprint.clone(),
            chunk_index,
            data,
        });

        let result = self
            .exchange(phase, request, self.config.chunk_attempts)
            .await;
        match result {
            Ok(PeerResponse::Chunk(outcome)) => {
                debug!(chunk_index, ?outcome, "Chunk delivered");
                Ok(())
            }
            Ok(other) => Err(SyncError::UnexpectedResponse {
                endpoint: Endpoint::TransferChunk,
                kind: other.kind(),
            }),
            Err(exhausted) => Err(SyncError::ChunkFailed {
                fingerprint: fingerprint.clone(),
                chunk_index,
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            }),
        }
    }

    async fn remote_status(
        &self,
        phase: &mut TransferSyncPhase,
        fingerprint: &Fingerprint,
    ) -> Result<TransferRecord, SyncError> {
        let request = PeerRequest::TransferStatus {
            fingerprint: fingerprint.clone(),
        };
        match self.request(phase, request).await? {
            PeerResponse::Status(record) => Ok(record),
            other => Err(SyncError::UnexpectedResponse {
                endpoint: Endpoint::TransferStatus,
                kind: other.kind(),
            }),
        }
    }

    /// Control requests share the clipboard retry budget.
    async fn request(
        &self,
        phase: &mut TransferSyncPhase,
        request: PeerRequest,
    ) -> Result<PeerResponse, SyncError> {
        let endpoint = request.endpoint();
        self.exchange(phase, request, self.config.retry.max_attempts)
            .await
            .map_err(|exhausted| SyncError::Channel {
                endpoint,
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }

    /// One request with its retries. The phase is back to idle afterwards,
    /// whatever the outcome.
    async fn exchange(
        &self,
        phase: &mut TransferSyncPhase,
        request: PeerRequest,
        max_attempts: u32,
    ) -> Result<PeerResponse, RetryExhausted> {
        let endpoint = request.endpoint();
        *phase = phase.send().unwrap_or(TransferSyncPhase::AwaitingAck);
        trace!(%endpoint, ?phase, "Transfer request on the wire");
        let result = self.send_with_retry(request, max_attempts).await;
        *phase = phase.on_ack();
        result
    }

    /// Mirror the delivered content into the local ledger.
    ///
    /// A local record that went stale during a long upload is announced again.
    fn complete_locally(
        &self,
        filename: &str,
        fingerprint: &Fingerprint,
        content: &Bytes,
    ) -> Result<TransferRecord, SyncError> {
        let record = match self.ledger.get(fingerprint) {
            Some(record) if record.status == TransferStatus::Complete => return Ok(record),
            Some(record) if record.status.is_active() => record,
            _ => self.ledger.begin_with_chunk_size(
                filename,
                content.len() as u64,
                fingerprint.clone(),
                self.config.chunk_size,
            )?,
        };

        for chunk_index in record.missing_chunks() {
            let data = chunk_of(content, chunk_index, record.chunk_size);
            self.ledger.record_chunk(fingerprint, chunk_index, data)?;
        }

        match self.ledger.finalize(fingerprint)? {
            FinalizeOutcome::Complete(record) => Ok(record),
            FinalizeOutcome::Incomplete(IncompleteReason::MissingChunks(missing)) => {
                Err(SyncError::Incomplete {
                    fingerprint: fingerprint.clone(),
                    missing,
                })
            }
            FinalizeOutcome::Incomplete(IncompleteReason::IntegrityMismatch { actual, .. }) => {
                Err(SyncError::Integrity {
                    fingerprint: fingerprint.clone(),
                    actual,
                })
            }
        }
    }
}

impl SyncEngine {
    /// Download a transfer the peer has completed.
    ///
    /// The peer's record is read first so the caller learns the filename. The
    /// bytes are checked against `fingerprint` before they are returned.
    pub async fn fetch_transfer(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<FetchedTransfer, SyncError> {
        let span = info_span!("usecase.sync.fetch_transfer", fingerprint = %fingerprint.short());

        async move {
            let status = PeerRequest::TransferStatus {
                fingerprint: fingerprint.clone(),
            };
            let record = match self.call(status).await? {
                PeerResponse::Status(record) => record,
                other => {
                    return Err(SyncError::UnexpectedResponse {
                        endpoint: Endpoint::TransferStatus,
                        kind: other.kind(),
                    })
                }
            };
            if record.status != TransferStatus::Complete {
                return Err(SyncError::RemoteNotComplete {
                    fingerprint: fingerprint.clone(),
                    status: record.status,
                });
            }

            let fetch = PeerRequest::FetchTransfer {
                fingerprint: fingerprint.clone(),
            };
            let content = match self.call(fetch).await? {
                PeerResponse::Content(content) => content,
                other => {
                    return Err(SyncError::UnexpectedResponse {
                        endpoint: Endpoint::TransferContent,
                        kind: other.kind(),
                    })
                }
            };
            let actual = Fingerprint::of(&content);
            if &actual != fingerprint {
                warn!(actual = %actual.short(), "Fetched content does not match its fingerprint");
                return Err(SyncError::Integrity {
                    fingerprint: fingerprint.clone(),
                    actual,
                });
            }

            info!(
                filename = %record.filename,
                size_bytes = content.len() as u64,
                "Fetched transfer from peer"
            );
            Ok(FetchedTransfer { record, content })
        }
        .instrument(span)
        .await
    }
}

fn chunk_of(content: &Bytes, chunk_index: u32, chunk_size: u32) -> Bytes {
    let chunk_size = chunk_size as usize;
    let start = (chunk_index as usize).saturating_mul(chunk_size).min(content.len());
    let end = start.saturating_add(chunk_size).min(content.len());
    content.slice(start..end)
}
