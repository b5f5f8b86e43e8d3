//! Clipboard domain models.
mod origin;
mod snapshot;
mod state;

pub use origin::ChangeSource;
pub use snapshot::ClipboardSnapshot;
pub use state::{ClipboardChange, ClipboardState, OfferOutcome, DEFAULT_HISTORY_CAPACITY};
