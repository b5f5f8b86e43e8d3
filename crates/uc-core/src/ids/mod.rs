//! ID type wrappers for type safety.

pub mod fingerprint;
pub mod peer_id;

pub use fingerprint::Fingerprint;
pub use peer_id::PeerId;
