use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use uc_app::runtime::{outbound_queue, ClipboardPoller, OutboundPublisher};
use uc_app::{PublishReport, SyncEngine, SyncEngineConfig, SyncError};
use uc_core::ports::{ClockPort, PeerChannelPort, SystemClipboardPort};
use uc_core::transfer::ChunkOutcome;
use uc_core::{
    ChannelError, ClipboardSnapshot, ClipboardState, Fingerprint, PeerId, PeerRequest,
    PeerResponse, TransferLedger, TransferStatus,
};

const MIB: usize = 1024 * 1024;

struct ManualClock(AtomicI64);

impl ClockPort for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

enum Fault {
    Deliver,
    /// Pretend the request went through without delivering it.
    DropWithAck,
    Refuse,
}

type FaultPlan = Box<dyn FnMut(&PeerRequest) -> Fault + Send>;

/// Routes requests straight into the other engine's `serve`.
struct LoopbackChannel {
    target: OnceLock<Arc<SyncEngine>>,
    faults: Mutex<Option<FaultPlan>>,
    chunk_log: Mutex<Vec<(u32, ChunkOutcome)>>,
}

impl LoopbackChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            target: OnceLock::new(),
            faults: Mutex::new(None),
            chunk_log: Mutex::new(Vec::new()),
        })
    }

    fn connect(&self, target: Arc<SyncEngine>) {
        assert!(self.target.set(target).is_ok(), "already connected");
    }

    fn inject(&self, plan: impl FnMut(&PeerRequest) -> Fault + Send + 'static) {
        *self.faults.lock().unwrap() = Some(Box::new(plan));
    }

    fn heal(&self) {
        *self.faults.lock().unwrap() = None;
    }

    fn chunk_log(&self) -> Vec<(u32, ChunkOutcome)> {
        self.chunk_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerChannelPort for LoopbackChannel {
    async fn send(&self, request: PeerRequest) -> Result<PeerResponse, ChannelError> {
        let fault = match self.faults.lock().unwrap().as_mut() {
            Some(plan) => plan(&request),
            None => Fault::Deliver,
        };
        match fault {
            Fault::Deliver => {}
            Fault::DropWithAck => return Ok(PeerResponse::Chunk(ChunkOutcome::Ack)),
            Fault::Refuse => return Err(ChannelError::ConnectionRefused("loopback down".into())),
        }

        let chunk_index = match &request {
            PeerRequest::SendChunk(chunk) => Some(chunk.chunk_index),
            _ => None,
        };
        let target = self
            .target
            .get()
            .ok_or_else(|| ChannelError::ConnectionRefused("not connected".into()))?;
        let response = target
            .serve(request)
            .await
            .map_err(|err| ChannelError::Protocol(err.to_string()))?;

        if let (Some(index), PeerResponse::Chunk(outcome)) = (chunk_index, &response) {
            self.chunk_log.lock().unwrap().push((index, *outcome));
        }
        Ok(response)
    }
}

struct Node {
    engine: Arc<SyncEngine>,
    channel: Arc<LoopbackChannel>,
}

fn node(name: &str, config: SyncEngineConfig) -> Node {
    let clock = Arc::new(ManualClock(AtomicI64::new(0)));
    let state = Arc::new(ClipboardState::new(PeerId::from(name)));
    let ledger = Arc::new(TransferLedger::new(clock, config.chunk_size));
    let channel = LoopbackChannel::new();
    let engine = Arc::new(SyncEngine::new(state, ledger, channel.clone(), config));
    Node { engine, channel }
}

fn pair(config: SyncEngineConfig) -> (Node, Node) {
    let a = node("peer-a", config);
    let b = node("peer-b", config);
    a.channel.connect(b.engine.clone());
    b.channel.connect(a.engine.clone());
    (a, b)
}

fn patterned(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

#[tokio::test]
async fn concurrent_equal_clocks_converge_on_greater_origin() {
    let (a, b) = pair(SyncEngineConfig::default());
    let hello = ClipboardSnapshot::new("hello", 5, PeerId::from("peer-a"));
    let world = ClipboardSnapshot::new("world", 5, PeerId::from("peer-b"));
    a.engine.state().offer(hello.clone());
    b.engine.state().offer(world.clone());

    let from_a = a.engine.publish(hello).await.unwrap();
    let from_b = b.engine.publish(world.clone()).await.unwrap();

    assert_eq!(
        from_a,
        PublishReport::PeerWon {
            winner: world.clone(),
            attempts: 1
        }
    );
    assert!(matches!(
        from_b,
        PublishReport::PeerWon { .. } | PublishReport::Delivered { .. }
    ));
    assert_eq!(a.engine.state().current(), world);
    assert_eq!(b.engine.state().current(), world);
}

#[tokio::test]
async fn file_with_dropped_chunk_is_repaired_and_verified() {
    let config = SyncEngineConfig {
        chunk_size: MIB as u32,
        ..SyncEngineConfig::default()
    };
    let (a, b) = pair(config);
    let content = patterned(10 * MIB);
    let fingerprint = Fingerprint::of(&content);

    let mut dropped = false;
    a.channel.inject(move |request| match request {
        PeerRequest::SendChunk(chunk) if chunk.chunk_index == 7 && !dropped => {
            dropped = true;
            Fault::DropWithAck
        }
        _ => Fault::Deliver,
    });

    let record = a
        .engine
        .publish_file("video.bin", content.clone())
        .await
        .unwrap();

    assert_eq!(record.status, TransferStatus::Complete);
    let log = a.channel.chunk_log();
    assert_eq!(log[7], (8, ChunkOutcome::OutOfOrder));
    assert_eq!(log[8], (9, ChunkOutcome::OutOfOrder));
    assert_eq!(log[9], (7, ChunkOutcome::Ack));
    assert_eq!(log.len(), 10);

    let received = b.engine.ledger().get(&fingerprint).unwrap();
    assert_eq!(received.status, TransferStatus::Complete);
    assert_eq!(received.total_chunks, 10);
    assert_eq!(b.engine.ledger().content(&fingerprint), Some(content));
}

#[tokio::test]
async fn interrupted_transfer_resumes_with_missing_chunks_only() {
    let config = SyncEngineConfig {
        chunk_size: 4,
        chunk_attempts: 1,
        ..SyncEngineConfig::default()
    };
    let (a, b) = pair(config);
    let content = patterned(20);
    let fingerprint = Fingerprint::of(&content);

    a.channel.inject(|request| match request {
        PeerRequest::SendChunk(chunk) if chunk.chunk_index >= 2 => Fault::Refuse,
        _ => Fault::Deliver,
    });
    let err = a
        .engine
        .publish_file("notes.txt", content.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ChunkFailed { chunk_index: 2, .. }));
    assert_eq!(
        b.engine.ledger().get(&fingerprint).unwrap().status,
        TransferStatus::InProgress
    );

    a.channel.heal();
    let record = a.engine.publish_file("notes.txt", content).await.unwrap();

    assert_eq!(record.status, TransferStatus::Complete);
    let resent: Vec<u32> = a
        .channel
        .chunk_log()
        .into_iter()
        .map(|(index, _)| index)
        .collect();
    assert_eq!(resent, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        b.engine.ledger().get(&fingerprint).unwrap().status,
        TransferStatus::Complete
    );
}

#[tokio::test]
async fn resending_finished_file_skips_streaming() {
    let config = SyncEngineConfig {
        chunk_size: 4,
        ..SyncEngineConfig::default()
    };
    let (a, _b) = pair(config);
    let content = patterned(9);

    a.engine
        .publish_file("a.bin", content.clone())
        .await
        .unwrap();
    let sent_before = a.channel.chunk_log().len();
    a.engine.publish_file("a.bin", content).await.unwrap();

    assert_eq!(a.channel.chunk_log().len(), sent_before);
}

#[tokio::test]
async fn handshake_exchanges_both_ids() {
    let (a, b) = pair(SyncEngineConfig::default());

    assert_eq!(a.engine.handshake().await.unwrap(), PeerId::from("peer-b"));
    assert_eq!(b.engine.remote_peer(), Some(&PeerId::from("peer-a")));
}

#[derive(Default)]
struct SharedClipboard(Mutex<Option<Vec<u8>>>);

impl SystemClipboardPort for SharedClipboard {
    fn read(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn write(&self, value: &[u8]) -> anyhow::Result<()> {
        *self.0.lock().unwrap() = Some(value.to_vec());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn copy_on_one_node_lands_on_the_other_without_echo() {
    let (a, b) = pair(SyncEngineConfig::default());
    let clipboard_a = Arc::new(SharedClipboard::default());
    let clipboard_b = Arc::new(SharedClipboard::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_millis(100);

    let mut tasks = Vec::new();
    for (engine, clipboard) in [
        (a.engine.clone(), clipboard_a.clone()),
        (b.engine.clone(), clipboard_b.clone()),
    ] {
        let (queue, rx) = outbound_queue();
        let poller = ClipboardPoller::new(engine.clone(), clipboard, queue, interval);
        tasks.push(tokio::spawn(poller.run(shutdown_rx.clone())));
        tasks.push(tokio::spawn(
            OutboundPublisher::new(engine, rx).run(shutdown_rx.clone()),
        ));
    }

    *clipboard_a.0.lock().unwrap() = Some(b"copied on a".to_vec());
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        clipboard_b.0.lock().unwrap().clone(),
        Some(b"copied on a".to_vec())
    );
    let current_a = a.engine.state().current();
    assert_eq!(current_a.origin_id, PeerId::from("peer-a"));
    assert_eq!(current_a.logical_clock, 1);
    assert_eq!(b.engine.state().current(), current_a);

    shutdown_tx.send(true).unwrap();
    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn peer_clipboard_is_pulled_and_adopted() {
    let (a, b) = pair(SyncEngineConfig::default());
    let copied = b.engine.state().record_local(b"from b".to_vec()).snapshot;

    let fetched = a.engine.fetch_peer_clipboard().await.unwrap();

    assert_eq!(fetched, copied);
    assert_eq!(a.engine.state().current(), copied);
}

#[tokio::test]
async fn sent_file_is_fetched_back_from_the_receiver() {
    let config = SyncEngineConfig {
        chunk_size: 4,
        ..SyncEngineConfig::default()
    };
    let (a, b) = pair(config);
    let content = patterned(13);
    let record = a
        .engine
        .publish_file("report.pdf", content.clone())
        .await
        .unwrap();

    let fetched = a.engine.fetch_transfer(&record.fingerprint).await.unwrap();

    assert_eq!(fetched.content, content);
    assert_eq!(fetched.record.filename, "report.pdf");

    let unknown = Fingerprint::of(b"never sent");
    assert!(a.engine.fetch_transfer(&unknown).await.is_err());
}
