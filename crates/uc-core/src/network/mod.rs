//! Messages exchanged with the remote peer.

mod error;
mod message;

pub use error::ChannelError;
pub use message::{Endpoint, PeerRequest, PeerResponse, TransferAnnouncement, TransferChunk};
