//! Infrastructure adapters: wall clock, persisted identity and the shared folder.

pub mod fs;
pub mod identity;
pub mod time;

pub use fs::FsReceivedFileStore;
pub use identity::FilePeerIdentity;
pub use time::SystemClock;
