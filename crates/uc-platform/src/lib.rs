//! Platform adapters: the system clipboard and the HTTP transport between peers.

pub mod clipboard;
pub mod http;

pub use clipboard::ArboardClipboard;
pub use http::{HttpPeerChannel, PeerHttpServer};
