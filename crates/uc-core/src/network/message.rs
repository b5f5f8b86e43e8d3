use std::fmt::{Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::clipboard::{ClipboardSnapshot, OfferOutcome};
use crate::ids::{Fingerprint, PeerId};
use crate::transfer::{BeginOutcome, ChunkOutcome, FinalizeOutcome, TransferRecord};

/// Remote operation a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Identity,
    Clipboard,
    TransferBegin,
    TransferChunk,
    TransferFinalize,
    TransferStatus,
    TransferContent,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Identity => "identity",
            Endpoint::Clipboard => "clipboard",
            Endpoint::TransferBegin => "transfer/begin",
            Endpoint::TransferChunk => "transfer/chunk",
            Endpoint::TransferFinalize => "transfer/finalize",
            Endpoint::TransferStatus => "transfer/status",
            Endpoint::TransferContent => "transfer/content",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAnnouncement {
    pub filename: String,
    pub size_bytes: u64,
    pub fingerprint: Fingerprint,
    /// Falls back to the receiver's configured chunk size when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u32>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferChunk {
    pub fingerprint: Fingerprint,
    pub chunk_index: u32,
    #[serde_as(as = "Base64")]
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    Handshake { peer_id: PeerId },
    FetchClipboard,
    PushClipboard(ClipboardSnapshot),
    BeginTransfer(TransferAnnouncement),
    SendChunk(TransferChunk),
    FinalizeTransfer { fingerprint: Fingerprint },
    TransferStatus { fingerprint: Fingerprint },
    FetchTransfer { fingerprint: Fingerprint },
}

impl PeerRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            PeerRequest::Handshake { .. } => Endpoint::Identity,
            PeerRequest::FetchClipboard | PeerRequest::PushClipboard(_) => Endpoint::Clipboard,
            PeerRequest::BeginTransfer(_) => Endpoint::TransferBegin,
            PeerRequest::SendChunk(_) => Endpoint::TransferChunk,
            PeerRequest::FinalizeTransfer { .. } => Endpoint::TransferFinalize,
            PeerRequest::TransferStatus { .. } => Endpoint::TransferStatus,
            PeerRequest::FetchTransfer { .. } => Endpoint::TransferContent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerResponse {
    Identity { peer_id: PeerId },
    Clipboard(ClipboardSnapshot),
    Offer(OfferOutcome),
    Begin(BeginOutcome),
    Chunk(ChunkOutcome),
    Finalize(FinalizeOutcome),
    Status(TransferRecord),
    Content(Bytes),
}

impl PeerResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerResponse::Identity { .. } => "identity",
            PeerResponse::Clipboard(_) => "clipboard",
            PeerResponse::Offer(_) => "offer",
            PeerResponse::Begin(_) => "begin",
            PeerResponse::Chunk(_) => "chunk",
            PeerResponse::Finalize(_) => "finalize",
            PeerResponse::Status(_) => "status",
            PeerResponse::Content(_) => "content",
        }
    }
}
