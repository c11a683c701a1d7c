//! Thread-safe handle over both ledgers.
//!
//! Each ledger sits behind its own [`parking_lot::Mutex`]; every operation
//! holds exactly one lock for its whole check-then-update, so no caller can
//! observe a half-applied mutation. Operations spanning both ledgers (only
//! [`LoyaltyLedger::snapshot`] today) lock programs before rewards.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LedgerConfig;
use crate::error::{LedgerResult, SnapshotError};
use crate::events::LedgerEvent;
use crate::ids::{Amount, ProgramId, RewardId};
use crate::program::{LoyaltyProgram, ProgramLedger};
use crate::reward::{Reward, RewardLedger};
use crate::snapshot::LedgerSnapshot;

/// Cheaply cloneable; all clones share the same state.
#[derive(Clone, Default)]
pub struct LoyaltyLedger {
    programs: Arc<Mutex<ProgramLedger>>,
    rewards: Arc<Mutex<RewardLedger>>,
}

impl LoyaltyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::from_parts(
            ProgramLedger::with_config(config),
            RewardLedger::with_config(config),
        )
    }

    pub fn from_parts(programs: ProgramLedger, rewards: RewardLedger) -> Self {
        Self {
            programs: Arc::new(Mutex::new(programs)),
            rewards: Arc::new(Mutex::new(rewards)),
        }
    }

    pub fn restore(snapshot: LedgerSnapshot, config: LedgerConfig) -> Result<Self, SnapshotError> {
        let (programs, rewards) = snapshot.restore(config)?;
        Ok(Self::from_parts(programs, rewards))
    }

    pub fn create_program(
        &self,
        name: &str,
        point_name: &str,
        caller: &str,
    ) -> LedgerResult<ProgramId> {
        self.programs.lock().create_program(name, point_name, caller)
    }

    pub fn issue_points(
        &self,
        program_id: ProgramId,
        user: &str,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<()> {
        self.programs.lock().issue_points(program_id, user, amount, caller)
    }

    pub fn deactivate_program(&self, program_id: ProgramId, caller: &str) -> LedgerResult<()> {
        self.programs.lock().deactivate_program(program_id, caller)
    }

    pub fn get_program(&self, program_id: ProgramId) -> LedgerResult<LoyaltyProgram> {
        self.programs.lock().get_program(program_id).cloned()
    }

    pub fn get_balance(&self, program_id: ProgramId, user: &str) -> Amount {
        self.programs.lock().get_balance(program_id, user)
    }

    pub fn add_reward(
        &self,
        name: &str,
        description: &str,
        cost: Amount,
        inventory: Amount,
        caller: &str,
    ) -> LedgerResult<RewardId> {
        self.rewards.lock().add_reward(name, description, cost, inventory, caller)
    }

    pub fn redeem_reward(
        &self,
        reward_id: RewardId,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<()> {
        self.rewards.lock().redeem_reward(reward_id, amount, caller)
    }

    pub fn get_reward(&self, reward_id: RewardId) -> LedgerResult<Reward> {
        self.rewards.lock().get_reward(reward_id).cloned()
    }

    pub fn get_user_redemptions(&self, user: &str, reward_id: RewardId) -> Amount {
        self.rewards.lock().get_user_redemptions(user, reward_id)
    }

    /// Program journal followed by reward journal.
    pub fn events(&self) -> Vec<LedgerEvent> {
        let mut events = self.programs.lock().events().to_vec();
        events.extend_from_slice(self.rewards.lock().events());
        events
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let programs = self.programs.lock();
        let rewards = self.rewards.lock();
        LedgerSnapshot::capture(&programs, &rewards)
    }
}
