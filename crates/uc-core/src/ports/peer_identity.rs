use crate::ids::PeerId;

pub trait PeerIdentityPort: Send + Sync {
    fn current_peer_id(&self) -> PeerId;
}
