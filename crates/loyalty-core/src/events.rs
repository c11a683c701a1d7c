use serde::{Deserialize, Serialize};

use crate::ids::{Amount, Identity, ProgramId, RewardId};

/// Journal entry appended by every successful mutation. Rejected calls
/// never produce an event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ProgramCreated {
        program_id: ProgramId,
        owner: Identity,
        name: String,
        point_name: String,
    },
    PointsIssued {
        program_id: ProgramId,
        user: Identity,
        amount: Amount,
        balance: Amount,
    },
    ProgramDeactivated {
        program_id: ProgramId,
    },
    RewardAdded {
        reward_id: RewardId,
        added_by: Identity,
        cost: Amount,
        inventory: Amount,
    },
    RewardRedeemed {
        reward_id: RewardId,
        user: Identity,
        amount: Amount,
        inventory_left: Amount,
    },
}
