//! Failure taxonomy shared by every layer.
//!
//! Each typed error exposes a `class()` so callers decide between retrying,
//! surfacing, or just logging without matching on every variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeout or refused connection. Retried with backoff.
    Transient,
    /// Lost a last-writer-wins race. Resolved deterministically, never shown to the user.
    Conflict,
    /// Fingerprint mismatch after reassembly. Surfaced, not retried.
    Integrity,
    /// Malformed or out-of-contract request. Rejected at the boundary.
    ProtocolViolation,
    /// Duplicate or out-of-order chunk, duplicate transfer announce.
    Informational,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        self == ErrorClass::Transient
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Integrity => "integrity",
            ErrorClass::ProtocolViolation => "protocol_violation",
            ErrorClass::Informational => "informational",
        }
    }
}
