//! JSON bodies exchanged between peers.
//!
//! Snapshots, announcements, chunks and transfer records travel as their
//! core types; only the answers that flatten an enum get a DTO here.

use serde::{Deserialize, Serialize};
use uc_core::transfer::{
    BeginOutcome, BeginRejection, ChunkOutcome, FinalizeOutcome, IncompleteReason,
};
use uc_core::{ClipboardSnapshot, ErrorClass, Fingerprint, OfferOutcome, PeerId, TransferRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OfferStatus {
    Applied,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponseDto {
    pub outcome: OfferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_snapshot: Option<ClipboardSnapshot>,
}

impl From<OfferOutcome> for OfferResponseDto {
    fn from(outcome: OfferOutcome) -> Self {
        match outcome {
            OfferOutcome::Applied => Self {
                outcome: OfferStatus::Applied,
                winning_snapshot: None,
            },
            OfferOutcome::Rejected { winner } => Self {
                outcome: OfferStatus::Rejected,
                winning_snapshot: Some(winner),
            },
        }
    }
}

impl TryFrom<OfferResponseDto> for OfferOutcome {
    type Error = String;

    fn try_from(dto: OfferResponseDto) -> Result<Self, Self::Error> {
        match (dto.outcome, dto.winning_snapshot) {
            (OfferStatus::Applied, _) => Ok(OfferOutcome::Applied),
            (OfferStatus::Rejected, Some(winner)) => Ok(OfferOutcome::Rejected { winner }),
            (OfferStatus::Rejected, None) => Err("rejected offer without winningSnapshot".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginResponseDto {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BeginRejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<TransferRecord>,
}

impl From<BeginOutcome> for BeginResponseDto {
    fn from(outcome: BeginOutcome) -> Self {
        match outcome {
            BeginOutcome::Accepted(record) => Self {
                accepted: true,
                reason: None,
                record: Some(record),
            },
            BeginOutcome::Rejected(reason) => Self {
                accepted: false,
                reason: Some(reason),
                record: None,
            },
        }
    }
}

impl TryFrom<BeginResponseDto> for BeginOutcome {
    type Error = String;

    fn try_from(dto: BeginResponseDto) -> Result<Self, Self::Error> {
        match (dto.accepted, dto.record, dto.reason) {
            (true, Some(record), _) => Ok(BeginOutcome::Accepted(record)),
            (false, _, Some(reason)) => Ok(BeginOutcome::Rejected(reason)),
            (true, None, _) => Err("accepted begin without record".into()),
            (false, _, None) => Err("rejected begin without reason".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponseDto {
    pub outcome: ChunkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequestDto {
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinalizeStatus {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncompleteKind {
    MissingChunks,
    IntegrityMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponseDto {
    pub status: FinalizeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<IncompleteKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_chunks: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<TransferRecord>,
}

impl From<FinalizeOutcome> for FinalizeResponseDto {
    fn from(outcome: FinalizeOutcome) -> Self {
        let empty = Self {
            status: FinalizeStatus::Incomplete,
            reason: None,
            missing_chunks: None,
            expected_fingerprint: None,
            actual_fingerprint: None,
            record: None,
        };
        match outcome {
            FinalizeOutcome::Complete(record) => Self {
                status: FinalizeStatus::Complete,
                record: Some(record),
                ..empty
            },
            FinalizeOutcome::Incomplete(IncompleteReason::MissingChunks(missing)) => Self {
                reason: Some(IncompleteKind::MissingChunks),
                missing_chunks: Some(missing),
                ..empty
            },
            FinalizeOutcome::Incomplete(IncompleteReason::IntegrityMismatch {
                expected,
                actual,
            }) => Self {
                reason: Some(IncompleteKind::IntegrityMismatch),
                expected_fingerprint: Some(expected),
                actual_fingerprint: Some(actual),
                ..empty
            },
        }
    }
}

impl TryFrom<FinalizeResponseDto> for FinalizeOutcome {
    type Error = String;

    fn try_from(dto: FinalizeResponseDto) -> Result<Self, Self::Error> {
        match dto.status {
            FinalizeStatus::Complete => dto
                .record
                .map(FinalizeOutcome::Complete)
                .ok_or_else(|| "complete finalize without record".to_string()),
            FinalizeStatus::Incomplete => match dto.reason {
                Some(IncompleteKind::MissingChunks) => Ok(FinalizeOutcome::Incomplete(
                    IncompleteReason::MissingChunks(dto.missing_chunks.unwrap_or_default()),
                )),
                Some(IncompleteKind::IntegrityMismatch) => {
                    match (dto.expected_fingerprint, dto.actual_fingerprint) {
                        (Some(expected), Some(actual)) => Ok(FinalizeOutcome::Incomplete(
                            IncompleteReason::IntegrityMismatch { expected, actual },
                        )),
                        _ => Err("integrity mismatch without fingerprints".to_string()),
                    }
                }
                None => Err("incomplete finalize without reason".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDto {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
}
