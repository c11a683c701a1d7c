use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::ids::Amount;

/// Runtime policy shared by both ledgers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject `issue_points` / `redeem_reward` calls with `amount == 0`.
    pub reject_zero_amounts: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reject_zero_amounts: true,
        }
    }
}

impl LedgerConfig {
    /// Accept every amount, including zero.
    pub fn permissive() -> Self {
        Self {
            reject_zero_amounts: false,
        }
    }

    pub(crate) fn check_amount(&self, amount: Amount) -> LedgerResult<()> {
        if self.reject_zero_amounts && amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }
}
