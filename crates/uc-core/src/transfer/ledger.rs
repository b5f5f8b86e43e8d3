use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use super::{
    ChunkOutcome, FinalizeOutcome, Finalized, IncompleteReason, TransferError, TransferLimits,
    TransferRecord, TransferStatus,
};
use crate::ids::Fingerprint;
use crate::ports::ClockPort;

pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// Tracks in-flight and finished transfers keyed by fingerprint.
///
/// The map lock is only held to find, insert, or drop entries. Each entry has
/// its own mutex, so chunks for different files never contend.
pub struct TransferLedger {
    clock: Arc<dyn ClockPort>,
    default_chunk_size: u32,
    limits: TransferLimits,
    entries: RwLock<HashMap<Fingerprint, Arc<Mutex<LedgerEntry>>>>,
}

struct LedgerEntry {
    record: TransferRecord,
    chunks: BTreeMap<u32, Bytes>,
    /// Lowest index not received yet. Only moves forward.
    next_missing: u32,
    content: Option<Bytes>,
}

impl LedgerEntry {
    fn new(record: TransferRecord) -> Self {
        Self {
            record,
            chunks: BTreeMap::new(),
            next_missing: 0,
            content: None,
        }
    }

    fn is_fully_received(&self) -> bool {
        self.next_missing >= self.record.total_chunks
    }

    fn fail(&mut self, reason: &str, now_ms: i64) {
        self.record.status = TransferStatus::Failed;
        self.record.failure_reason = Some(reason.to_string());
        self.record.updated_at_ms = now_ms;
        self.chunks.clear();
    }
}

impl TransferLedger {
    pub fn new(clock: Arc<dyn ClockPort>, default_chunk_size: u32) -> Self {
        Self {
            clock,
            default_chunk_size,
            limits: TransferLimits::for_chunk_size(default_chunk_size),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, limits: TransferLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn default_chunk_size(&self) -> u32 {
        self.default_chunk_size
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    pub fn begin(
        &self,
        filename: &str,
        size_bytes: u64,
        fingerprint: Fingerprint,
    ) -> Result<TransferRecord, TransferError> {
        self.begin_with_chunk_size(filename, size_bytes, fingerprint, self.default_chunk_size)
    }

    /// Announce a transfer.
    ///
    /// A Failed record is replaced with a fresh one. Pending or InProgress
    /// records are rejected so one content is never transferred twice at once.
    /// Announcements outside [`TransferLimits`] are refused before anything
    /// is stored.
    pub fn begin_with_chunk_size(
        &self,
        filename: &str,
        size_bytes: u64,
        fingerprint: Fingerprint,
        chunk_size: u32,
    ) -> Result<TransferRecord, TransferError> {
        if filename.trim().is_empty() {
            return Err(TransferError::InvalidAnnouncement(
                "filename is empty".to_string(),
            ));
        }
        let total_chunks = self.limits.check(size_bytes, chunk_size)?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&fingerprint) {
            let status = lock_entry(existing).record.status;
            if status.is_active() {
                return Err(TransferError::DuplicateTransfer(fingerprint));
            }
            if status == TransferStatus::Complete {
                return Err(TransferError::AlreadyComplete(fingerprint));
            }
            debug!(fingerprint = %fingerprint.short(), "Restarting failed transfer");
        }

        let record = TransferRecord {
            fingerprint: fingerprint.clone(),
            filename: filename.to_string(),
            size_bytes,
            chunk_size,
            total_chunks,
            status: TransferStatus::Pending,
            chunks_received: BTreeSet::new(),
            updated_at_ms: self.clock.now_ms(),
            failure_reason: None,
        };
        entries.insert(
            fingerprint.clone(),
            Arc::new(Mutex::new(LedgerEntry::new(record.clone()))),
        );

        info!(
            fingerprint = %fingerprint.short(),
            filename,
            size_bytes,
            total_chunks,
            "Transfer announced"
        );
        Ok(record)
    }

    pub fn record_chunk(
        &self,
        fingerprint: &Fingerprint,
        chunk_index: u32,
        data: Bytes,
    ) -> Result<ChunkOutcome, TransferError> {
        let entry = self.entry(fingerprint)?;
        let mut guard = lock_entry(&entry);
        let entry = &mut *guard;
        let record = &mut entry.record;

        if record.status.is_terminal() {
            return Err(TransferError::NotActive {
                fingerprint: fingerprint.clone(),
                status: record.status,
            });
        }
        if chunk_index >= record.total_chunks {
            return Err(TransferError::ChunkOutOfRange {
                index: chunk_index,
                total: record.total_chunks,
            });
        }
        if record.chunks_received.contains(&chunk_index) {
            return Ok(ChunkOutcome::Duplicate);
        }

        let expected = record.expected_chunk_len(chunk_index);
        if data.len() as u64 != expected {
            return Err(TransferError::ChunkSizeMismatch {
                index: chunk_index,
                expected,
                actual: data.len() as u64,
            });
        }

        let in_order = chunk_index == entry.next_missing;
        record.chunks_received.insert(chunk_index);
        record.status = TransferStatus::InProgress;
        record.updated_at_ms = self.clock.now_ms();
        entry.chunks.insert(chunk_index, data);
        while record.chunks_received.contains(&entry.next_missing) {
            entry.next_missing += 1;
        }

        Ok(if in_order {
            ChunkOutcome::Ack
        } else {
            ChunkOutcome::OutOfOrder
        })
    }

    /// Reassemble and verify.
    ///
    /// Finalizing a Complete transfer again returns the same record, so a
    /// lost finalize response can be retried safely.
    pub fn finalize(&self, fingerprint: &Fingerprint) -> Result<FinalizeOutcome, TransferError> {
        self.finalize_tracked(fingerprint)
            .map(|finalized| finalized.outcome)
    }

    /// [`finalize`](Self::finalize), also telling whether this call is the
    /// one that completed the transfer. Decided under the entry lock.
    pub fn finalize_tracked(&self, fingerprint: &Fingerprint) -> Result<Finalized, TransferError> {
        let entry = self.entry(fingerprint)?;
        let mut entry = lock_entry(&entry);
        let unchanged = |outcome| Finalized {
            outcome,
            newly_completed: false,
        };

        match entry.record.status {
            TransferStatus::Complete => {
                return Ok(unchanged(FinalizeOutcome::Complete(entry.record.clone())))
            }
            TransferStatus::Failed => {
                return Err(TransferError::NotActive {
                    fingerprint: fingerprint.clone(),
                    status: TransferStatus::Failed,
                })
            }
            TransferStatus::Pending | TransferStatus::InProgress => {}
        }

        if !entry.is_fully_received() {
            let missing = entry.record.missing_chunks();
            debug!(
                fingerprint = %fingerprint.short(),
                missing = missing.len(),
                "Finalize requested with chunks missing"
            );
            return Ok(unchanged(FinalizeOutcome::Incomplete(
                IncompleteReason::MissingChunks(missing),
            )));
        }

        let mut assembled = BytesMut::with_capacity(entry.record.size_bytes as usize);
        for chunk in entry.chunks.values() {
            assembled.extend_from_slice(chunk);
        }
        let actual = Fingerprint::of(&assembled);
        let now = self.clock.now_ms();
        entry.chunks.clear();

        if &actual != fingerprint {
            warn!(
                expected = %fingerprint.short(),
                actual = %actual.short(),
                "Transfer failed integrity check"
            );
            entry.fail("integrity mismatch", now);
            return Ok(unchanged(FinalizeOutcome::Incomplete(
                IncompleteReason::IntegrityMismatch {
                    expected: fingerprint.clone(),
                    actual,
                },
            )));
        }

        entry.record.status = TransferStatus::Complete;
        entry.record.updated_at_ms = now;
        entry.content = Some(assembled.freeze());
        info!(
            fingerprint = %fingerprint.short(),
            filename = %entry.record.filename,
            size_bytes = entry.record.size_bytes,
            "Transfer complete"
        );
        Ok(Finalized {
            outcome: FinalizeOutcome::Complete(entry.record.clone()),
            newly_completed: true,
        })
    }

    /// Abort an active transfer. Already failed records are returned unchanged.
    pub fn mark_failed(
        &self,
        fingerprint: &Fingerprint,
        reason: &str,
    ) -> Result<TransferRecord, TransferError> {
        let entry = self.entry(fingerprint)?;
        let mut entry = lock_entry(&entry);
        match entry.record.status {
            TransferStatus::Failed => Ok(entry.record.clone()),
            TransferStatus::Complete => Err(TransferError::NotActive {
                fingerprint: fingerprint.clone(),
                status: TransferStatus::Complete,
            }),
            TransferStatus::Pending | TransferStatus::InProgress => {
                entry.fail(reason, self.clock.now_ms());
                warn!(fingerprint = %fingerprint.short(), reason, "Transfer marked failed");
                Ok(entry.record.clone())
            }
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<TransferRecord> {
        let entry = self.entry(fingerprint).ok()?;
        let entry = lock_entry(&entry);
        Some(entry.record.clone())
    }

    /// Reassembled bytes, available only once the transfer is Complete.
    pub fn content(&self, fingerprint: &Fingerprint) -> Option<Bytes> {
        let entry = self.entry(fingerprint).ok()?;
        let entry = lock_entry(&entry);
        entry.content.clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail active transfers that saw no begin or chunk for `idle` or longer.
    ///
    /// Their chunks are dropped at once. The records themselves go the way
    /// of every terminal record on a later [`evict`](Self::evict).
    pub fn expire_stale(&self, idle: Duration) -> usize {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(horizon_ms(idle));

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut expired = 0;
        for (fingerprint, entry) in entries.iter() {
            let mut entry = lock_entry(entry);
            if entry.record.status.is_active() && entry.record.updated_at_ms <= cutoff {
                entry.fail("stalled", now);
                expired += 1;
                warn!(
                    fingerprint = %fingerprint.short(),
                    received = entry.record.chunks_received.len(),
                    total_chunks = entry.record.total_chunks,
                    "Transfer stalled, marked failed"
                );
            }
        }
        expired
    }

    /// Remove terminal records whose last update is at least `older_than` ago.
    pub fn evict(&self, older_than: Duration) -> usize {
        let cutoff = self.clock.now_ms().saturating_sub(horizon_ms(older_than));

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| {
            let entry = lock_entry(entry);
            !(entry.record.status.is_terminal() && entry.record.updated_at_ms <= cutoff)
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "Evicted terminal transfers");
        }
        evicted
    }

    fn entry(&self, fingerprint: &Fingerprint) -> Result<Arc<Mutex<LedgerEntry>>, TransferError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| TransferError::UnknownTransfer(fingerprint.clone()))
    }
}

fn lock_entry(entry: &Mutex<LedgerEntry>) -> MutexGuard<'_, LedgerEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn horizon_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
