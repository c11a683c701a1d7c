//! Catalog rewards and per-user redemption counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::ids::{Amount, IdSequence, Identity, RewardId};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub description: String,
    /// Informational only; redemption is gated by inventory, not balances.
    pub cost: Amount,
    pub inventory: Amount,
}

impl Reward {
    pub fn debit(&mut self, amount: Amount) -> LedgerResult<()> {
        if self.inventory < amount {
            return Err(LedgerError::InsufficientInventory {
                requested: amount,
                available: self.inventory,
            });
        }
        self.inventory -= amount;
        Ok(())
    }
}

/// Rewards keyed by id, plus cumulative redemptions keyed by
/// `(user, reward)`.
#[derive(Debug, Default)]
pub struct RewardLedger {
    pub(crate) config: LedgerConfig,
    pub(crate) rewards: BTreeMap<RewardId, Reward>,
    pub(crate) redemptions: BTreeMap<Identity, BTreeMap<RewardId, Amount>>,
    pub(crate) sequence: IdSequence,
    pub(crate) events: Vec<LedgerEvent>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    /// Add a catalog entry. Any caller may add rewards; the caller is only
    /// recorded in the journal. Fails only once the id space is exhausted.
    pub fn add_reward(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        cost: Amount,
        inventory: Amount,
        caller: &str,
    ) -> LedgerResult<RewardId> {
        let id = self.sequence.allocate().inspect_err(|err| {
            warn!(added_by = caller, %err, "reward creation rejected");
        })?;
        let reward = Reward {
            id,
            name: name.into(),
            description: description.into(),
            cost,
            inventory,
        };
        info!(
            reward_id = id,
            added_by = caller,
            name = %reward.name,
            cost,
            inventory,
            "reward added"
        );
        self.rewards.insert(id, reward);
        self.events.push(LedgerEvent::RewardAdded {
            reward_id: id,
            added_by: caller.to_owned(),
            cost,
            inventory,
        });
        Ok(id)
    }

    /// Take `amount` units of a reward out of inventory on behalf of
    /// `caller`. Either the whole amount is redeemed or nothing changes.
    pub fn redeem_reward(
        &mut self,
        reward_id: RewardId,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<()> {
        match self.try_redeem(reward_id, amount, caller) {
            Ok(inventory_left) => {
                self.events.push(LedgerEvent::RewardRedeemed {
                    reward_id,
                    user: caller.to_owned(),
                    amount,
                    inventory_left,
                });
                info!(reward_id, user = caller, amount, inventory_left, "reward redeemed");
                Ok(())
            }
            Err(err) => {
                warn!(reward_id, user = caller, amount, %err, "redemption rejected");
                Err(err)
            }
        }
    }

    fn try_redeem(
        &mut self,
        reward_id: RewardId,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<Amount> {
        if !self.rewards.contains_key(&reward_id) {
            return Err(LedgerError::NotFound);
        }
        self.config.check_amount(amount)?;
        let redeemed = self
            .get_user_redemptions(caller, reward_id)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let reward = self
            .rewards
            .get_mut(&reward_id)
            .ok_or(LedgerError::NotFound)?;
        reward.debit(amount)?;
        let inventory_left = reward.inventory;
        self.redemptions
            .entry(caller.to_owned())
            .or_default()
            .insert(reward_id, redeemed);
        Ok(inventory_left)
    }

    pub fn get_reward(&self, reward_id: RewardId) -> LedgerResult<&Reward> {
        debug!(reward_id, "reward lookup");
        self.rewards.get(&reward_id).ok_or(LedgerError::NotFound)
    }

    pub fn get_user_redemptions(&self, user: &str, reward_id: RewardId) -> Amount {
        self.redemptions
            .get(user)
            .and_then(|rewards| rewards.get(&reward_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn rewards(&self) -> impl Iterator<Item = &Reward> + '_ {
        self.rewards.values()
    }

    /// All redemption counters ordered by `(user, reward)`.
    pub fn redemptions(&self) -> impl Iterator<Item = (&str, RewardId, Amount)> + '_ {
        self.redemptions.iter().flat_map(|(user, rewards)| {
            rewards
                .iter()
                .map(move |(reward_id, amount)| (user.as_str(), *reward_id, *amount))
        })
    }

    pub fn last_reward_id(&self) -> RewardId {
        self.sequence.last()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }
}
