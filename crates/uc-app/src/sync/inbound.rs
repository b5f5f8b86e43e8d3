use tracing::{debug, error, info, info_span, Instrument};
use uc_core::transfer::{BeginOutcome, BeginRejection, FinalizeOutcome};
use uc_core::{PeerRequest, PeerResponse, TransferError, TransferRecord};

use super::{InboundError, SyncEngine};

impl SyncEngine {
    /// Answer one request from the peer.
    pub async fn serve(&self, request: PeerRequest) -> Result<PeerResponse, InboundError> {
        let span = info_span!("usecase.sync.serve", endpoint = %request.endpoint());
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: PeerRequest) -> Result<PeerResponse, InboundError> {
        match request {
            PeerRequest::Handshake { peer_id } => {
                self.note_remote_peer(peer_id);
                Ok(PeerResponse::Identity {
                    peer_id: self.local_peer().clone(),
                })
            }
            PeerRequest::FetchClipboard => Ok(PeerResponse::Clipboard(self.state.current())),
            PeerRequest::PushClipboard(snapshot) => {
                Ok(PeerResponse::Offer(self.apply(snapshot)))
            }
            PeerRequest::BeginTransfer(announcement) => {
                let chunk_size = match announcement.chunk_size {
                    Some(requested) if !self.ledger.limits().accepts_chunk_size(requested) => {
                        debug!(
                            requested,
                            default = self.ledger.default_chunk_size(),
                            "Refusing announced chunk size"
                        );
                        return Ok(PeerResponse::Begin(BeginOutcome::Rejected(
                            BeginRejection::UnsupportedChunkSize,
                        )));
                    }
                    Some(requested) => requested,
                    None => self.ledger.default_chunk_size(),
                };
                let begun = self.ledger.begin_with_chunk_size(
                    &announcement.filename,
                    announcement.size_bytes,
                    announcement.fingerprint,
                    chunk_size,
                );
                let outcome = match begun {
                    Ok(record) => BeginOutcome::Accepted(record),
                    Err(TransferError::DuplicateTransfer(_)) => {
                        BeginOutcome::Rejected(BeginRejection::DuplicateTransfer)
                    }
                    Err(TransferError::AlreadyComplete(_)) => {
                        BeginOutcome::Rejected(BeginRejection::AlreadyComplete)
                    }
                    Err(err) => return Err(err.into()),
                };
                Ok(PeerResponse::Begin(outcome))
            }
            PeerRequest::SendChunk(chunk) => {
                let outcome =
                    self.ledger
                        .record_chunk(&chunk.fingerprint, chunk.chunk_index, chunk.data)?;
                Ok(PeerResponse::Chunk(outcome))
            }
            PeerRequest::FinalizeTransfer { fingerprint } => {
                let finalized = self.ledger.finalize_tracked(&fingerprint)?;
                if let (FinalizeOutcome::Complete(record), true) =
                    (&finalized.outcome, finalized.newly_completed)
                {
                    self.deliver_received_file(record).await;
                }
                Ok(PeerResponse::Finalize(finalized.outcome))
            }
            PeerRequest::TransferStatus { fingerprint } => self
                .ledger
                .get(&fingerprint)
                .map(PeerResponse::Status)
                .ok_or_else(|| TransferError::UnknownTransfer(fingerprint).into()),
            PeerRequest::FetchTransfer { fingerprint } => self
                .ledger
                .content(&fingerprint)
                .map(PeerResponse::Content)
                .ok_or(InboundError::NotComplete(fingerprint)),
        }
    }

    /// A failed store is logged only; the content stays fetchable from the ledger.
    async fn deliver_received_file(&self, record: &TransferRecord) {
        let Some(store) = &self.received_files else {
            debug!("No file store configured, keeping content in the ledger");
            return;
        };
        let Some(content) = self.ledger.content(&record.fingerprint) else {
            return;
        };

        match store.store(record, content).await {
            Ok(path) => info!(
                filename = %record.filename,
                path = %path.display(),
                "Received file saved"
            ),
            Err(err) => error!(
                fingerprint = %record.fingerprint.short(),
                error = %format!("{err:#}"),
                "Failed to save received file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use uc_core::network::{TransferAnnouncement, TransferChunk};
    use uc_core::ports::ReceivedFileStorePort;
    use uc_core::transfer::ChunkOutcome;
    use uc_core::{ClipboardSnapshot, ErrorClass, Fingerprint, OfferOutcome, PeerId};

    use super::*;
    use crate::sync::engine::tests::{engine_with, ScriptedChannel};
    use crate::sync::SyncEngineConfig;

    #[derive(Default)]
    struct RecordingStore {
        stored: Mutex<Vec<(String, Bytes)>>,
    }

    #[async_trait]
    impl ReceivedFileStorePort for RecordingStore {
        async fn store(&self, record: &TransferRecord, content: Bytes) -> anyhow::Result<PathBuf> {
            self.stored
                .lock()
                .unwrap()
                .push((record.filename.clone(), content));
            Ok(PathBuf::from("/shared").join(&record.filename))
        }
    }

    fn receiver() -> (SyncEngine, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        let channel = Arc::new(ScriptedChannel::always(Err(uc_core::ChannelError::Timeout)));
        let config = SyncEngineConfig {
            chunk_size: 4,
            ..SyncEngineConfig::default()
        };
        let engine = engine_with("peer-b", channel, config).with_received_files(store.clone());
        (engine, store)
    }

    fn announce(content: &[u8]) -> PeerRequest {
        announce_chunked(content, None)
    }

    fn announce_chunked(content: &[u8], chunk_size: Option<u32>) -> PeerRequest {
        PeerRequest::BeginTransfer(TransferAnnouncement {
            filename: "a.txt".to_string(),
            size_bytes: content.len() as u64,
            fingerprint: Fingerprint::of(content),
            chunk_size,
        })
    }

    fn chunk(content: &[u8], index: u32, data: &'static [u8]) -> PeerRequest {
        PeerRequest::SendChunk(TransferChunk {
            fingerprint: Fingerprint::of(content),
            chunk_index: index,
            data: Bytes::from_static(data),
        })
    }

    #[tokio::test]
    async fn handshake_answers_with_local_id() {
        let (engine, _) = receiver();
        let response = engine
            .serve(PeerRequest::Handshake {
                peer_id: PeerId::from("peer-a"),
            })
            .await
            .unwrap();

        assert_eq!(
            response,
            PeerResponse::Identity {
                peer_id: PeerId::from("peer-b")
            }
        );
        assert_eq!(engine.remote_peer(), Some(&PeerId::from("peer-a")));
    }

    #[tokio::test]
    async fn pushed_clipboard_goes_through_last_writer_wins() {
        let (engine, _) = receiver();
        let newer = ClipboardSnapshot::new("new", 2, PeerId::from("peer-a"));
        let older = ClipboardSnapshot::new("old", 1, PeerId::from("peer-a"));

        let first = engine.serve(PeerRequest::PushClipboard(newer.clone())).await;
        let second = engine.serve(PeerRequest::PushClipboard(older)).await;

        assert_eq!(first.unwrap(), PeerResponse::Offer(OfferOutcome::Applied));
        assert_eq!(
            second.unwrap(),
            PeerResponse::Offer(OfferOutcome::Rejected {
                winner: newer.clone()
            })
        );
        assert_eq!(
            engine.serve(PeerRequest::FetchClipboard).await.unwrap(),
            PeerResponse::Clipboard(newer)
        );
    }

    #[tokio::test]
    async fn completed_transfer_is_stored_once() {
        let (engine, store) = receiver();
        let content = b"abcdef";
        let fingerprint = Fingerprint::of(content);

        assert!(matches!(
            engine.serve(announce(content)).await.unwrap(),
            PeerResponse::Begin(BeginOutcome::Accepted(_))
        ));
        assert_eq!(
            engine.serve(chunk(content, 0, b"abcd")).await.unwrap(),
            PeerResponse::Chunk(ChunkOutcome::Ack)
        );
        assert_eq!(
            engine.serve(chunk(content, 1, b"ef")).await.unwrap(),
            PeerResponse::Chunk(ChunkOutcome::Ack)
        );

        let finalize = PeerRequest::FinalizeTransfer {
            fingerprint: fingerprint.clone(),
        };
        for _ in 0..2 {
            assert!(matches!(
                engine.serve(finalize.clone()).await.unwrap(),
                PeerResponse::Finalize(FinalizeOutcome::Complete(_))
            ));
        }

        let stored = store.stored.lock().unwrap().clone();
        assert_eq!(stored, vec![("a.txt".to_string(), Bytes::from_static(content))]);
        assert_eq!(
            engine
                .serve(PeerRequest::FetchTransfer { fingerprint })
                .await
                .unwrap(),
            PeerResponse::Content(Bytes::from_static(content))
        );
    }

    #[tokio::test]
    async fn second_announce_is_rejected_as_duplicate() {
        let (engine, _) = receiver();
        engine.serve(announce(b"abcdef")).await.unwrap();

        assert_eq!(
            engine.serve(announce(b"abcdef")).await.unwrap(),
            PeerResponse::Begin(BeginOutcome::Rejected(BeginRejection::DuplicateTransfer))
        );
    }

    #[tokio::test]
    async fn unknown_and_incomplete_transfers_are_errors() {
        let (engine, _) = receiver();
        let fingerprint = Fingerprint::of(b"nothing");

        let status = engine
            .serve(PeerRequest::TransferStatus {
                fingerprint: fingerprint.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            status,
            InboundError::Transfer(TransferError::UnknownTransfer(_))
        ));

        engine.serve(announce(b"abcdef")).await.unwrap();
        let fetch = engine
            .serve(PeerRequest::FetchTransfer {
                fingerprint: Fingerprint::of(b"abcdef"),
            })
            .await
            .unwrap_err();
        assert!(matches!(fetch, InboundError::NotComplete(_)));
        assert_eq!(fetch.class(), ErrorClass::ProtocolViolation);
    }

    #[tokio::test]
    async fn wrong_sized_chunk_is_a_protocol_violation() {
        let (engine, _) = receiver();
        let content = b"abcdef";
        engine.serve(announce(content)).await.unwrap();

        let err = engine
            .serve(chunk(content, 0, b"abc"))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    }

    #[tokio::test]
    async fn chunk_size_above_local_default_is_refused() {
        let (engine, _) = receiver();
        let content = b"abcdefghij";

        assert_eq!(
            engine.serve(announce_chunked(content, Some(8))).await.unwrap(),
            PeerResponse::Begin(BeginOutcome::Rejected(BeginRejection::UnsupportedChunkSize))
        );
        assert!(engine.ledger().is_empty());

        match engine.serve(announce_chunked(content, Some(4))).await.unwrap() {
            PeerResponse::Begin(BeginOutcome::Accepted(record)) => assert_eq!(record.chunk_size, 4),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_finalizes_store_the_file_once() {
        let (engine, store) = receiver();
        let engine = Arc::new(engine);
        let content = b"abcdef";
        let fingerprint = Fingerprint::of(content);
        engine.serve(announce(content)).await.unwrap();
        engine.serve(chunk(content, 0, b"abcd")).await.unwrap();
        engine.serve(chunk(content, 1, b"ef")).await.unwrap();

        let finalizes: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let request = PeerRequest::FinalizeTransfer {
                    fingerprint: fingerprint.clone(),
                };
                tokio::spawn(async move { engine.serve(request).await })
            })
            .collect();
        for finalize in finalizes {
            assert!(matches!(
                finalize.await.unwrap().unwrap(),
                PeerResponse::Finalize(FinalizeOutcome::Complete(_))
            ));
        }

        assert_eq!(store.stored.lock().unwrap().len(), 1);
    }
}
