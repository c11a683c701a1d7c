use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{Amount, ProgramId, RewardId};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure of a single ledger call. Every failure leaves state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Program missing, caller is not the owner, or the program is inactive.
    /// The three cases are reported identically so non-owners learn nothing
    /// about which programs exist.
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: Amount, available: Amount },

    /// Zero amounts are rejected unless the ledger config allows them.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// A balance, redemption counter or id sequence would pass `u64::MAX`.
    #[error("counter overflow")]
    Overflow,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized => ErrorKind::Unauthorized,
            LedgerError::NotFound => ErrorKind::NotFound,
            LedgerError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            LedgerError::InvalidAmount => ErrorKind::InvalidAmount,
            LedgerError::Overflow => ErrorKind::Overflow,
        }
    }
}

/// Wire-level error code carried in a failed [`CallOutcome`](crate::CallOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "err-unauthorized")]
    Unauthorized,
    #[serde(rename = "err-not-found")]
    NotFound,
    #[serde(rename = "err-insufficient-inventory")]
    InsufficientInventory,
    #[serde(rename = "err-invalid-amount")]
    InvalidAmount,
    #[serde(rename = "err-overflow")]
    Overflow,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "err-unauthorized",
            ErrorKind::NotFound => "err-not-found",
            ErrorKind::InsufficientInventory => "err-insufficient-inventory",
            ErrorKind::InvalidAmount => "err-invalid-amount",
            ErrorKind::Overflow => "err-overflow",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Rejection of a snapshot handed to [`LedgerSnapshot::restore`](crate::LedgerSnapshot::restore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("state root mismatch: recorded {recorded}, computed {computed}")]
    RootMismatch { recorded: String, computed: String },

    #[error("duplicate program id {0}")]
    DuplicateProgram(ProgramId),

    #[error("duplicate reward id {0}")]
    DuplicateReward(RewardId),

    #[error("entity id must be non-zero")]
    ZeroId,

    #[error("id {id} exceeds recorded sequence {last}")]
    IdBeyondSequence { id: u64, last: u64 },

    /// Ids must run `1..=last` without gaps.
    #[error("recorded sequence {last} does not match {count} stored entities")]
    SequenceMismatch { last: u64, count: u64 },

    #[error("recorded height {recorded} does not match {journaled} journaled events")]
    HeightMismatch { recorded: u64, journaled: u64 },

    #[error("duplicate balance for {user} in program {program_id}")]
    DuplicateBalance { program_id: ProgramId, user: String },

    #[error("duplicate redemption counter for {user} on reward {reward_id}")]
    DuplicateRedemption { user: String, reward_id: RewardId },

    #[error("balance references unknown program {0}")]
    UnknownProgram(ProgramId),

    #[error("redemption references unknown reward {0}")]
    UnknownReward(RewardId),
}
