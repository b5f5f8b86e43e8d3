use serde::{Deserialize, Serialize};

/// Where an accepted clipboard change came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Captured from this machine's clipboard.
    Local,
    /// Pushed by the remote peer.
    Peer,
}
