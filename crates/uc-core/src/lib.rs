//! # uc-core
//!
//! Core domain models and sync rules for UniClipboard Share.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

// Public module exports
pub mod clipboard;
pub mod config;
pub mod error;
pub mod ids;
pub mod network;
pub mod ports;
pub mod sync;
pub mod transfer;

// Re-export commonly used types at the crate root
pub use clipboard::{ChangeSource, ClipboardChange, ClipboardSnapshot, ClipboardState, OfferOutcome};
pub use config::AppConfig;
pub use error::ErrorClass;
pub use ids::{Fingerprint, PeerId};
pub use network::{ChannelError, Endpoint, PeerRequest, PeerResponse};
pub use sync::{ClipboardSyncPhase, TransferSyncPhase};
pub use transfer::{
    TransferError, TransferLedger, TransferLimits, TransferRecord, TransferStatus,
};
