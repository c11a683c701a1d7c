//! Loyalty ledger primitives.
//!
//! Two independent state machines share the same shape:
//!
//! * [`program`]: loyalty programs and the points each program has issued
//!   to its users. Only a program's owner may issue points or deactivate it.
//! * [`reward`]: catalog rewards and the per-user redemption counters,
//!   gated by each reward's remaining inventory.
//!
//! [`LoyaltyLedger`] wraps both behind one lock per ledger so callers on
//! several threads observe every operation atomically. [`snapshot`] exports
//! the combined state with a SHA-256 state root, and [`CallOutcome`] is the
//! `{success, value | error}` envelope handed back to external callers.

pub mod config;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod program;
pub mod reward;
pub mod service;
pub mod snapshot;

mod error;

pub use config::LedgerConfig;
pub use error::{ErrorKind, LedgerError, LedgerResult, SnapshotError};
pub use events::LedgerEvent;
pub use ids::{Amount, IdSequence, Identity, ProgramId, RewardId};
pub use outcome::CallOutcome;
pub use program::{LoyaltyProgram, ProgramLedger};
pub use reward::{Reward, RewardLedger};
pub use service::LoyaltyLedger;
pub use snapshot::{LedgerSnapshot, PointBalance, RedemptionCounter, SnapshotMetadata};
