//! Derived-state ledger for the membership vault reward system.
//!
//! The ledger is a deterministic projection of the vault's append-only
//! event log. It tracks vault positions, per-member reward scores, epoch
//! rotations, finalized epochs, and the per-member disbursements that
//! follow from them. The ledger never panics; it returns errors.
//!
//! # Architecture
//!
//! - [`clock`] -- Epoch Clock: maps timestamps to epoch indices.
//! - [`positions`] -- Vault Position Tracker.
//! - [`membership`] -- The [`Roster`] aggregate and holdings adjustments.
//! - [`checkpoint`] -- Once-per-epoch score rotation.
//! - [`finalizer`] -- Epoch finalization and score snapshots.
//! - [`disbursement`] -- Pro-rata allocation and claim tracking.
//! - [`invariants`] -- Sum and allocation-bound verification.
//! - [`math`] -- Overflow-free `floor(a * b / c)` for token amounts.
//! - [`state`] -- [`LedgerState`], the aggregate root, and its pure
//!   transition function [`LedgerState::apply`].
//!
//! # Atomicity
//!
//! Every operation validates completely before it mutates anything, so an
//! operation that returns an error leaves the ledger exactly as it was.
//!
//! # Usage
//!
//! ```
//! use vault_ledger::{EpochClock, LedgerState};
//! use vault_types::{MemberId, VaultEvent};
//!
//! let clock = EpochClock::new(604_800).ok();
//! let mut ledger = LedgerState::new(clock.unwrap_or_default());
//! let member = MemberId::parse("0x00000000000000000000000000000000000000aa").ok();
//!
//! if let Some(member) = member {
//!     let _ = ledger.apply(&VaultEvent::AdjustedHoldings {
//!         member: member.clone(),
//!         eligible_amount: 0,
//!         next_epoch_amount: 100,
//!     });
//!     let _ = ledger.apply(&VaultEvent::Checkpoint { block_timestamp: 604_800 });
//!     let _ = ledger.apply(&VaultEvent::EpochFinalized {
//!         epoch: 1,
//!         total_rewards: 1000,
//!         block_timestamp: 1_209_600,
//!     });
//!     let allocated = ledger
//!         .disbursements()
//!         .get(&member, 1)
//!         .map(|d| d.allocated_amount);
//!     assert_eq!(allocated, Some(1000));
//! }
//! ```

pub mod checkpoint;
pub mod clock;
pub mod disbursement;
pub mod finalizer;
pub mod invariants;
pub mod math;
pub mod membership;
pub mod positions;
pub mod state;

// Re-export primary types at crate root.
pub use checkpoint::CheckpointOutcome;
pub use clock::{EpochClock, DEFAULT_EPOCH_LENGTH_SECONDS, epoch_of};
pub use disbursement::{AllocationSummary, DisbursementBook};
pub use finalizer::EpochBook;
pub use invariants::InvariantResult;
pub use membership::{HoldingsChange, Roster};
pub use positions::{PositionTracker, WithdrawalOutcome};
pub use state::{LedgerState, Transition};

use vault_types::{MemberId, PositionId, VaultAsset};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when applying an event to the ledger.
///
/// Every variant is fatal for an ingestion run: the ingestor halts and
/// surfaces it rather than skipping the event, since a skipped event
/// causes drift that nothing downstream can detect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Epoch length must be at least one second.
    #[error("epoch length must be non-zero")]
    InvalidEpochLength,

    /// A deposit reused a position id that is still open.
    #[error("{asset} position {position_id} already exists")]
    DuplicatePosition {
        /// Asset of the position.
        asset: VaultAsset,
        /// The reused position id.
        position_id: PositionId,
    },

    /// A withdrawal referenced a position that is not open.
    #[error("{asset} position {position_id} does not exist")]
    UnknownPosition {
        /// Asset of the position.
        asset: VaultAsset,
        /// The unknown position id.
        position_id: PositionId,
    },

    /// An epoch was finalized twice.
    #[error("epoch {epoch} is already finalized")]
    DuplicateFinalization {
        /// The epoch index.
        epoch: u64,
    },

    /// A claim referenced a (member, epoch) pair with no allocation.
    #[error("no disbursement for member {member} in epoch {epoch}")]
    UnknownDisbursement {
        /// The claiming member.
        member: MemberId,
        /// The epoch claimed against.
        epoch: u64,
    },

    /// A claim would push `claimed_amount` above `allocated_amount`.
    #[error(
        "overclaim by {member} in epoch {epoch}: claimed {claimed} + {delta} exceeds allocation {allocated}"
    )]
    Overclaim {
        /// The claiming member.
        member: MemberId,
        /// The epoch claimed against.
        epoch: u64,
        /// The member's allocation.
        allocated: u128,
        /// Amount claimed before this event.
        claimed: u128,
        /// Amount this event tried to claim.
        delta: u128,
    },

    /// A checkpoint mapped to an epoch earlier than the last rotation.
    #[error("checkpoint for epoch {requested} precedes last checkpointed epoch {last}")]
    CheckpointRegression {
        /// Epoch of the last rotation.
        last: u64,
        /// Epoch the checkpoint timestamp maps to.
        requested: u64,
    },

    /// Checked arithmetic overflowed or underflowed.
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// A ledger invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(LedgerAnomaly),
}

/// Coarse classification of [`LedgerError`]s for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An event referenced state that does not exist, or is otherwise
    /// inconsistent with the stream so far.
    Malformed,
    /// An event re-applied something that was already applied.
    Duplicate,
    /// An arithmetic invariant failed.
    Arithmetic,
    /// The ledger was constructed with invalid parameters.
    Configuration,
}

impl LedgerError {
    /// Classify the error for logs and alerts.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidEpochLength => ErrorCategory::Configuration,
            Self::DuplicatePosition { .. } | Self::DuplicateFinalization { .. } => {
                ErrorCategory::Duplicate
            }
            Self::UnknownPosition { .. }
            | Self::UnknownDisbursement { .. }
            | Self::CheckpointRegression { .. } => ErrorCategory::Malformed,
            Self::Overclaim { .. } | Self::ArithmeticOverflow(_) | Self::InvariantViolation(_) => {
                ErrorCategory::Arithmetic
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// Which invariant an anomaly concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// `eligible_score_total != sum(eligible_score)`.
    EligibleSum,
    /// `next_epoch_score_total != sum(next_epoch_score)`.
    NextEpochSum,
    /// Allocations for an epoch exceed its total rewards.
    AllocationBound,
    /// Members hold eligible score but the eligible total is zero.
    EmptyEligibleTotal,
}

/// An invariant violation detected by [`invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The violated invariant.
    pub kind: AnomalyKind,
    /// The value the invariant requires.
    pub expected: u128,
    /// The value actually found.
    pub actual: u128,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
