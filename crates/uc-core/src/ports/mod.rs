//! Port interfaces for the application layer
//!
//! Ports define the contract between the sync engine and the adapters that
//! talk to the outside world: the remote peer, the system clipboard, the
//! shared folder and the wall clock. Use cases depend on these traits only.

mod clock;
mod peer_channel;
mod peer_identity;
mod received_files;
mod system_clipboard;

pub use clock::ClockPort;
pub use peer_channel::PeerChannelPort;
pub use peer_identity::PeerIdentityPort;
pub use received_files::ReceivedFileStorePort;
pub use system_clipboard::SystemClipboardPort;
