//! Point-in-time export of both ledgers with a SHA-256 state root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::LedgerConfig;
use crate::error::SnapshotError;
use crate::events::LedgerEvent;
use crate::ids::{Amount, IdSequence, Identity, ProgramId, RewardId};
use crate::program::{LoyaltyProgram, ProgramLedger};
use crate::reward::{Reward, RewardLedger};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    /// Number of journaled mutations across both ledgers.
    pub height: u64,
    pub last_program_id: ProgramId,
    pub last_reward_id: RewardId,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointBalance {
    pub program_id: ProgramId,
    pub user: Identity,
    pub balance: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedemptionCounter {
    pub user: Identity,
    pub reward_id: RewardId,
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub programs: Vec<LoyaltyProgram>,
    pub balances: Vec<PointBalance>,
    pub rewards: Vec<Reward>,
    pub redemptions: Vec<RedemptionCounter>,
    pub program_events: Vec<LedgerEvent>,
    pub reward_events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn capture(programs: &ProgramLedger, rewards: &RewardLedger) -> Self {
        let program_list: Vec<LoyaltyProgram> = programs.programs().cloned().collect();
        let balances: Vec<PointBalance> = programs
            .balances()
            .map(|(program_id, user, balance)| PointBalance {
                program_id,
                user: user.to_owned(),
                balance,
            })
            .collect();
        let reward_list: Vec<Reward> = rewards.rewards().cloned().collect();
        let redemptions: Vec<RedemptionCounter> = rewards
            .redemptions()
            .map(|(user, reward_id, amount)| RedemptionCounter {
                user: user.to_owned(),
                reward_id,
                amount,
            })
            .collect();
        let state_root = compute_state_root(&program_list, &balances, &reward_list, &redemptions);
        Self {
            meta: SnapshotMetadata {
                height: (programs.events().len() + rewards.events().len()) as u64,
                last_program_id: programs.last_program_id(),
                last_reward_id: rewards.last_reward_id(),
            },
            programs: program_list,
            balances,
            rewards: reward_list,
            redemptions,
            program_events: programs.events().to_vec(),
            reward_events: rewards.events().to_vec(),
            state_root,
        }
    }

    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Rebuild both ledgers, verifying the recorded state root, journal
    /// height and id sequences first. Every id in `1..=last` must be present
    /// exactly once.
    pub fn restore(
        self,
        config: LedgerConfig,
    ) -> Result<(ProgramLedger, RewardLedger), SnapshotError> {
        let computed = compute_state_root(
            &self.programs,
            &self.balances,
            &self.rewards,
            &self.redemptions,
        );
        if computed != self.state_root {
            return Err(SnapshotError::RootMismatch {
                recorded: hex::encode(self.state_root),
                computed: hex::encode(computed),
            });
        }

        let journaled = (self.program_events.len() + self.reward_events.len()) as u64;
        if journaled != self.meta.height {
            return Err(SnapshotError::HeightMismatch {
                recorded: self.meta.height,
                journaled,
            });
        }

        let mut programs = BTreeMap::new();
        for program in self.programs {
            check_id(program.id, self.meta.last_program_id)?;
            let id = program.id;
            if programs.insert(id, program).is_some() {
                return Err(SnapshotError::DuplicateProgram(id));
            }
        }
        check_sequence(self.meta.last_program_id, programs.len())?;
        let mut balances: BTreeMap<ProgramId, BTreeMap<Identity, Amount>> = BTreeMap::new();
        for entry in self.balances {
            if !programs.contains_key(&entry.program_id) {
                return Err(SnapshotError::UnknownProgram(entry.program_id));
            }
            let users = balances.entry(entry.program_id).or_default();
            if users.contains_key(&entry.user) {
                return Err(SnapshotError::DuplicateBalance {
                    program_id: entry.program_id,
                    user: entry.user,
                });
            }
            users.insert(entry.user, entry.balance);
        }

        let mut rewards = BTreeMap::new();
        for reward in self.rewards {
            check_id(reward.id, self.meta.last_reward_id)?;
            let id = reward.id;
            if rewards.insert(id, reward).is_some() {
                return Err(SnapshotError::DuplicateReward(id));
            }
        }
        check_sequence(self.meta.last_reward_id, rewards.len())?;
        let mut redemptions: BTreeMap<Identity, BTreeMap<RewardId, Amount>> = BTreeMap::new();
        for entry in self.redemptions {
            if !rewards.contains_key(&entry.reward_id) {
                return Err(SnapshotError::UnknownReward(entry.reward_id));
            }
            let counters = redemptions.entry(entry.user.clone()).or_default();
            if counters.insert(entry.reward_id, entry.amount).is_some() {
                return Err(SnapshotError::DuplicateRedemption {
                    user: entry.user,
                    reward_id: entry.reward_id,
                });
            }
        }

        debug!(
            height = self.meta.height,
            programs = programs.len(),
            rewards = rewards.len(),
            "ledger snapshot restored"
        );
        Ok((
            ProgramLedger {
                config,
                programs,
                balances,
                sequence: IdSequence::resume_after(self.meta.last_program_id),
                events: self.program_events,
            },
            RewardLedger {
                config,
                rewards,
                redemptions,
                sequence: IdSequence::resume_after(self.meta.last_reward_id),
                events: self.reward_events,
            },
        ))
    }
}

fn check_id(id: u64, last: u64) -> Result<(), SnapshotError> {
    if id == 0 {
        return Err(SnapshotError::ZeroId);
    }
    if id > last {
        return Err(SnapshotError::IdBeyondSequence { id, last });
    }
    Ok(())
}

/// Ids are non-zero, unique and at most `last`, so a matching count means
/// they cover `1..=last` with no gaps.
fn check_sequence(last: u64, count: usize) -> Result<(), SnapshotError> {
    let count = count as u64;
    if count != last {
        return Err(SnapshotError::SequenceMismatch { last, count });
    }
    Ok(())
}

/// Hash every entity and counter into a binary SHA-256 tree. Strings are
/// length-prefixed so adjacent fields can never run together.
pub fn compute_state_root(
    programs: &[LoyaltyProgram],
    balances: &[PointBalance],
    rewards: &[Reward],
    redemptions: &[RedemptionCounter],
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for program in programs {
        let mut hasher = Sha256::new();
        hasher.update(b"program");
        hasher.update(program.id.to_le_bytes());
        update_str(&mut hasher, &program.name);
        update_str(&mut hasher, &program.owner);
        update_str(&mut hasher, &program.point_name);
        hasher.update([program.active as u8]);
        leaves.push(hasher.finalize().into());
    }
    for entry in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"balance");
        hasher.update(entry.program_id.to_le_bytes());
        update_str(&mut hasher, &entry.user);
        hasher.update(entry.balance.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for reward in rewards {
        let mut hasher = Sha256::new();
        hasher.update(b"reward");
        hasher.update(reward.id.to_le_bytes());
        update_str(&mut hasher, &reward.name);
        update_str(&mut hasher, &reward.description);
        hasher.update(reward.cost.to_le_bytes());
        hasher.update(reward.inventory.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for entry in redemptions {
        let mut hasher = Sha256::new();
        hasher.update(b"redemption");
        update_str(&mut hasher, &entry.user);
        hasher.update(entry.reward_id.to_le_bytes());
        hasher.update(entry.amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_tree(leaves)
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn build_tree(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"loyalty-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            // odd node out is paired with itself
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut root = [0u8; 32];
        hex::decode_to_slice(encoded.trim(), &mut root).map_err(D::Error::custom)?;
        Ok(root)
    }
}
