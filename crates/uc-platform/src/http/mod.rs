//! HTTP transport between the two peers.
//!
//! JSON bodies use camelCase field names and base64 for byte values. Transfer
//! content is served as raw bytes.

mod client;
pub mod dto;
mod server;

pub use client::HttpPeerChannel;
pub use server::{router, PeerHttpServer};
