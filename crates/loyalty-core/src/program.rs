//! Loyalty programs and the point balances they issue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::ids::{Amount, IdSequence, Identity, ProgramId};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoyaltyProgram {
    pub id: ProgramId,
    pub name: String,
    pub owner: Identity,
    pub point_name: String,
    pub active: bool,
}

impl LoyaltyProgram {
    pub fn is_owned_by(&self, caller: &str) -> bool {
        self.owner == caller
    }

    /// Only the owner of an active program may issue its points.
    pub fn can_issue(&self, caller: &str) -> bool {
        self.active && self.is_owned_by(caller)
    }
}

/// Programs keyed by id, plus balances keyed by `(program, user)`.
///
/// A missing balance entry reads as zero. Entries are created on first
/// issuance and only ever grow.
#[derive(Debug, Default)]
pub struct ProgramLedger {
    pub(crate) config: LedgerConfig,
    pub(crate) programs: BTreeMap<ProgramId, LoyaltyProgram>,
    pub(crate) balances: BTreeMap<ProgramId, BTreeMap<Identity, Amount>>,
    pub(crate) sequence: IdSequence,
    pub(crate) events: Vec<LedgerEvent>,
}

impl ProgramLedger {
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

    /// Register a new program owned by `caller`. Fails only once the id
    /// space is exhausted.
    pub fn create_program(
        &mut self,
        name: impl Into<String>,
        point_name: impl Into<String>,
        caller: &str,
    ) -> LedgerResult<ProgramId> {
        let id = self.sequence.allocate().inspect_err(|err| {
            warn!(owner = caller, %err, "program creation rejected");
        })?;
        let program = LoyaltyProgram {
            id,
            name: name.into(),
            owner: caller.to_owned(),
            point_name: point_name.into(),
            active: true,
        };
        self.events.push(LedgerEvent::ProgramCreated {
            program_id: id,
            owner: program.owner.clone(),
            name: program.name.clone(),
            point_name: program.point_name.clone(),
        });
        info!(program_id = id, owner = caller, name = %program.name, "loyalty program created");
        self.programs.insert(id, program);
        Ok(id)
    }

    pub fn issue_points(
        &mut self,
        program_id: ProgramId,
        user: &str,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<()> {
        match self.try_issue(program_id, user, amount, caller) {
            Ok(balance) => {
                self.events.push(LedgerEvent::PointsIssued {
                    program_id,
                    user: user.to_owned(),
                    amount,
                    balance,
                });
                info!(program_id, user, amount, balance, "points issued");
                Ok(())
            }
            Err(err) => {
                warn!(program_id, user, amount, caller, %err, "points issuance rejected");
                Err(err)
            }
        }
    }

    fn try_issue(
        &mut self,
        program_id: ProgramId,
        user: &str,
        amount: Amount,
        caller: &str,
    ) -> LedgerResult<Amount> {
        let authorized = self
            .programs
            .get(&program_id)
            .is_some_and(|program| program.can_issue(caller));
        if !authorized {
            return Err(LedgerError::Unauthorized);
        }
        self.config.check_amount(amount)?;
        let balance = self
            .get_balance(program_id, user)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balances
            .entry(program_id)
            .or_default()
            .insert(user.to_owned(), balance);
        Ok(balance)
    }

    /// Mark a program inactive. Balances stay as they are; later issuance
    /// is rejected. Deactivating an inactive program succeeds again.
    pub fn deactivate_program(&mut self, program_id: ProgramId, caller: &str) -> LedgerResult<()> {
        let Some(program) = self
            .programs
            .get_mut(&program_id)
            .filter(|program| program.is_owned_by(caller))
        else {
            warn!(program_id, caller, "program deactivation rejected");
            return Err(LedgerError::Unauthorized);
        };
        program.active = false;
        self.events.push(LedgerEvent::ProgramDeactivated { program_id });
        info!(program_id, "loyalty program deactivated");
        Ok(())
    }

    pub fn get_program(&self, program_id: ProgramId) -> LedgerResult<&LoyaltyProgram> {
        debug!(program_id, "program lookup");
        self.programs.get(&program_id).ok_or(LedgerError::NotFound)
    }

    pub fn get_balance(&self, program_id: ProgramId, user: &str) -> Amount {
        self.balances
            .get(&program_id)
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(0)
    }

    pub fn programs(&self) -> impl Iterator<Item = &LoyaltyProgram> + '_ {
        self.programs.values()
    }

    /// Every user holding a balance in `program_id`, ordered by identity.
    pub fn balances_of(&self, program_id: ProgramId) -> impl Iterator<Item = (&str, Amount)> + '_ {
        self.balances
            .get(&program_id)
            .into_iter()
            .flat_map(|users| users.iter().map(|(user, amount)| (user.as_str(), *amount)))
    }

    /// All balances ordered by `(program, user)`.
    pub fn balances(&self) -> impl Iterator<Item = (ProgramId, &str, Amount)> + '_ {
        self.balances.iter().flat_map(|(program_id, users)| {
            users
                .iter()
                .map(move |(user, amount)| (*program_id, user.as_str(), *amount))
        })
    }

    pub fn last_program_id(&self) -> ProgramId {
        self.sequence.last()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
    const USER: &str = "ST2PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
    const STRANGER: &str = "ST3PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    fn ledger_with_program() -> (ProgramLedger, ProgramId) {
        let mut ledger = ProgramLedger::new();
        let id = ledger.create_program("Coffee Rewards", "Coffee Points", OWNER).unwrap();
        (ledger, id)
    }

    #[test]
    fn creates_program_owned_by_caller() {
        let (ledger, id) = ledger_with_program();
        assert_eq!(id, 1);
        let program = ledger.get_program(id).unwrap();
        assert_eq!(program.name, "Coffee Rewards");
        assert_eq!(program.point_name, "Coffee Points");
        assert_eq!(program.owner, OWNER);
        assert!(program.active);
    }

    #[test]
    fn ids_follow_creation_order_despite_failures() {
        let mut ledger = ProgramLedger::new();
        for expected in 1..=5 {
            assert_eq!(ledger.issue_points(999, USER, 1, OWNER), Err(LedgerError::Unauthorized));
            assert_eq!(ledger.deactivate_program(999, OWNER), Err(LedgerError::Unauthorized));
            assert_eq!(ledger.create_program("p", "pts", OWNER), Ok(expected));
        }
        assert_eq!(ledger.last_program_id(), 5);
    }

    #[test]
    fn accrues_points_across_issuances() {
        let (mut ledger, id) = ledger_with_program();
        ledger.issue_points(id, USER, 100, OWNER).unwrap();
        ledger.issue_points(id, USER, 50, OWNER).unwrap();
        assert_eq!(ledger.get_balance(id, USER), 150);

        assert_eq!(
            ledger.issue_points(id, USER, 10, STRANGER),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(ledger.get_balance(id, USER), 150);
    }

    #[test]
    fn issuance_to_missing_program_is_unauthorized() {
        let mut ledger = ProgramLedger::new();
        assert_eq!(
            ledger.issue_points(999, USER, 100, OWNER),
            Err(LedgerError::Unauthorized)
        );
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn deactivation_blocks_issuance_but_keeps_balances() {
        let (mut ledger, id) = ledger_with_program();
        ledger.issue_points(id, USER, 100, OWNER).unwrap();
        ledger.deactivate_program(id, OWNER).unwrap();
        assert!(!ledger.get_program(id).unwrap().active);

        assert_eq!(
            ledger.issue_points(id, USER, 1, OWNER),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(ledger.get_balance(id, USER), 100);
    }

    #[test]
    fn deactivation_is_idempotent() {
        let (mut ledger, id) = ledger_with_program();
        ledger.deactivate_program(id, OWNER).unwrap();
        ledger.deactivate_program(id, OWNER).unwrap();
        assert!(!ledger.get_program(id).unwrap().active);
    }

    #[test]
    fn only_owner_can_deactivate() {
        let (mut ledger, id) = ledger_with_program();
        assert_eq!(
            ledger.deactivate_program(id, STRANGER),
            Err(LedgerError::Unauthorized)
        );
        assert!(ledger.get_program(id).unwrap().active);
        assert_eq!(
            ledger.deactivate_program(999, OWNER),
            Err(LedgerError::Unauthorized)
        );
    }

    #[test]
    fn missing_program_lookup_is_not_found() {
        let ledger = ProgramLedger::new();
        assert_eq!(ledger.get_program(999), Err(LedgerError::NotFound));
    }

    #[test]
    fn unknown_balance_reads_zero() {
        let (ledger, id) = ledger_with_program();
        assert_eq!(ledger.get_balance(id, STRANGER), 0);
        assert_eq!(ledger.get_balance(999, STRANGER), 0);
    }

    #[test]
    fn zero_amount_rejected_by_default() {
        let (mut ledger, id) = ledger_with_program();
        assert_eq!(
            ledger.issue_points(id, USER, 0, OWNER),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(ledger.balances_of(id).count(), 0);
    }

    #[test]
    fn zero_amount_from_stranger_is_still_unauthorized() {
        let (mut ledger, id) = ledger_with_program();
        assert_eq!(
            ledger.issue_points(id, USER, 0, STRANGER),
            Err(LedgerError::Unauthorized)
        );
    }

    #[test]
    fn permissive_config_records_zero_issuance() {
        let mut ledger = ProgramLedger::with_config(LedgerConfig::permissive());
        let id = ledger.create_program("Coffee Rewards", "Coffee Points", OWNER).unwrap();
        ledger.issue_points(id, USER, 0, OWNER).unwrap();
        assert_eq!(ledger.balances_of(id).collect::<Vec<_>>(), vec![(USER, 0)]);
    }

    #[test]
    fn overflowing_issuance_is_rejected_in_full() {
        let (mut ledger, id) = ledger_with_program();
        ledger.issue_points(id, USER, u64::MAX, OWNER).unwrap();
        assert_eq!(
            ledger.issue_points(id, USER, 1, OWNER),
            Err(LedgerError::Overflow)
        );
        assert_eq!(ledger.get_balance(id, USER), u64::MAX);
    }

    #[test]
    fn balances_are_keyed_per_program_and_user() {
        let mut ledger = ProgramLedger::new();
        let coffee = ledger.create_program("Coffee Rewards", "Coffee Points", OWNER).unwrap();
        let tea = ledger.create_program("Tea Rewards", "Tea Points", OWNER).unwrap();
        ledger.issue_points(coffee, "1-alice", 5, OWNER).unwrap();
        ledger.issue_points(tea, "alice", 7, OWNER).unwrap();
        assert_eq!(ledger.get_balance(coffee, "1-alice"), 5);
        assert_eq!(ledger.get_balance(tea, "alice"), 7);
        assert_eq!(ledger.get_balance(coffee, "alice"), 0);
        assert_eq!(ledger.get_balance(tea, "1-alice"), 0);
        assert_eq!(
            ledger.balances().collect::<Vec<_>>(),
            vec![(coffee, "1-alice", 5), (tea, "alice", 7)]
        );
    }

    #[test]
    fn journal_records_successful_mutations_only() {
        let (mut ledger, id) = ledger_with_program();
        ledger.issue_points(id, USER, 100, OWNER).unwrap();
        let _ = ledger.issue_points(id, USER, 100, STRANGER);
        ledger.deactivate_program(id, OWNER).unwrap();
        assert_eq!(ledger.events().len(), 3);
        assert_eq!(
            ledger.events()[1],
            LedgerEvent::PointsIssued {
                program_id: id,
                user: USER.into(),
                amount: 100,
                balance: 100,
            }
        );
        assert_eq!(
            ledger.events()[2],
            LedgerEvent::ProgramDeactivated { program_id: id }
        );
    }
}
