use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::ids::PeerId;

/// An immutable clipboard value stamped with its causal position.
///
/// Snapshots are never edited. A newer value produces a new snapshot and the
/// old one is kept in [`ClipboardState`](super::ClipboardState) history.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardSnapshot {
    #[serde_as(as = "Base64")]
    pub value: Vec<u8>,
    pub logical_clock: u64,
    pub origin_id: PeerId,
}

impl ClipboardSnapshot {
    pub fn new(value: impl Into<Vec<u8>>, logical_clock: u64, origin_id: PeerId) -> Self {
        Self {
            value: value.into(),
            logical_clock,
            origin_id,
        }
    }

    /// The snapshot every node starts from: empty value at clock zero.
    pub fn initial(origin_id: PeerId) -> Self {
        Self::new(Vec::new(), 0, origin_id)
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Last-writer-wins order.
    ///
    /// Higher clock wins, then the lexically greater origin. The value bytes
    /// are only compared when clock and origin are both equal, which a
    /// well-behaved peer never produces.
    pub fn causal_cmp(&self, other: &Self) -> Ordering {
        self.logical_clock
            .cmp(&other.logical_clock)
            .then_with(|| self.origin_id.cmp(&other.origin_id))
            .then_with(|| self.value.cmp(&other.value))
    }

    pub fn supersedes(&self, other: &Self) -> bool {
        self.causal_cmp(other) == Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(value: &str, clock: u64, origin: &str) -> ClipboardSnapshot {
        ClipboardSnapshot::new(value, clock, PeerId::from(origin))
    }

    #[test]
    fn higher_clock_supersedes() {
        assert!(snap("b", 2, "peer-a").supersedes(&snap("a", 1, "peer-z")));
        assert!(!snap("a", 1, "peer-z").supersedes(&snap("b", 2, "peer-a")));
    }

    #[test]
    fn equal_clock_breaks_tie_by_origin() {
        let a = snap("hello", 5, "peer-a");
        let b = snap("world", 5, "peer-b");
        assert!(b.supersedes(&a));
        assert!(!a.supersedes(&b));
    }

    #[test]
    fn identical_snapshot_does_not_supersede_itself() {
        let a = snap("hello", 5, "peer-a");
        assert!(!a.supersedes(&a.clone()));
    }

    #[test]
    fn serializes_value_as_base64_in_camel_case() {
        let json = serde_json::to_value(snap("hi", 3, "peer-a")).unwrap();
        assert_eq!(json["value"], "aGk=");
        assert_eq!(json["logicalClock"], 3);
        assert_eq!(json["originId"], "peer-a");
    }
}
