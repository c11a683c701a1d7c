use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

pub type ProgramId = u64;
pub type RewardId = u64;
pub type Amount = u64;

/// Opaque caller reference supplied by the invocation layer. Only ever
/// compared for equality.
pub type Identity = String;

/// Monotonic id allocator owned by a single ledger. The first allocated id
/// is 1; ids are never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequence {
    last: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a sequence that has already handed out every id up to `last`.
    pub fn resume_after(last: u64) -> Self {
        Self { last }
    }

    /// Fails with [`LedgerError::Overflow`] once the id space is exhausted;
    /// the sequence is left untouched.
    pub fn allocate(&mut self) -> LedgerResult<u64> {
        self.last = self.last.checked_add(1).ok_or(LedgerError::Overflow)?;
        Ok(self.last)
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}
