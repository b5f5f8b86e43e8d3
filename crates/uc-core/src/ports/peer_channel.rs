//! Peer channel port - request/response exchange with the remote node

use async_trait::async_trait;

use crate::network::{ChannelError, PeerRequest, PeerResponse};

/// Transport-agnostic request/response exchange with the remote node.
///
/// Implementations enforce their own timeout and map transport failures to
/// [`ChannelError`]. They must not retry: backoff policy lives in the sync
/// engine.
#[async_trait]
pub trait PeerChannelPort: Send + Sync {
    async fn send(&self, request: PeerRequest) -> Result<PeerResponse, ChannelError>;
}
