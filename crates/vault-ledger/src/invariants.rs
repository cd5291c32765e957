//! Invariant verification for the membership ledger.
//!
//! Two families of checks:
//!
//! - **Sum invariants**: roster totals equal the sum of member scores.
//!   `eligible_score_total == sum(eligible_score)` must hold after every
//!   rotation. Rotation copies next-epoch values into eligible ones, so the
//!   checkpoint rotator verifies the next-epoch sum *before* rotating and
//!   commits only if it holds.
//! - **Allocation bound**: the allocations for an epoch never exceed its
//!   total rewards. Flooring makes the sum fall short by at most one unit
//!   per recipient; it may never go over.
//!
//! A violation produces a [`LedgerAnomaly`], which the ingestor treats as
//! fatal.

use vault_types::Disbursement;

use crate::membership::Roster;
use crate::{AnomalyKind, LedgerAnomaly};

/// The outcome of an invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantResult {
    /// The invariant holds.
    Holds,
    /// The invariant is violated.
    Anomaly(LedgerAnomaly),
}

impl InvariantResult {
    /// Convert into a `Result`, mapping an anomaly to
    /// [`LedgerError::InvariantViolation`](crate::LedgerError::InvariantViolation).
    ///
    /// # Errors
    ///
    /// Returns the anomaly as an error if the invariant is violated.
    pub fn into_result(self) -> Result<(), crate::LedgerError> {
        match self {
            Self::Holds => Ok(()),
            Self::Anomaly(anomaly) => Err(crate::LedgerError::InvariantViolation(anomaly)),
        }
    }
}

fn sum_anomaly(kind: AnomalyKind, label: &str, expected: u128, actual: u128) -> InvariantResult {
    InvariantResult::Anomaly(LedgerAnomaly {
        kind,
        expected,
        actual,
        message: format!(
            "LEDGER_ANOMALY: {label} total {expected} does not match member sum {actual}"
        ),
    })
}

fn saturating_sum(values: impl Iterator<Item = u128>) -> u128 {
    values.fold(0_u128, u128::saturating_add)
}

/// Verify `eligible_score_total == sum(eligible_score)`.
pub fn verify_eligible_sum(roster: &Roster) -> InvariantResult {
    let sum = saturating_sum(roster.members().map(|m| m.eligible_score));
    if sum == roster.eligible_score_total() {
        InvariantResult::Holds
    } else {
        sum_anomaly(
            AnomalyKind::EligibleSum,
            "eligible",
            roster.eligible_score_total(),
            sum,
        )
    }
}

/// Verify `next_epoch_score_total == sum(next_epoch_score)`.
///
/// This is the eligible-sum invariant as it will stand immediately after
/// the next rotation.
pub fn verify_next_epoch_sum(roster: &Roster) -> InvariantResult {
    let sum = saturating_sum(roster.members().map(|m| m.next_epoch_score));
    if sum == roster.next_epoch_score_total() {
        InvariantResult::Holds
    } else {
        sum_anomaly(
            AnomalyKind::NextEpochSum,
            "next-epoch",
            roster.next_epoch_score_total(),
            sum,
        )
    }
}

/// Verify that `allocations` together do not exceed `total_rewards`.
pub fn verify_allocation_bound(
    epoch: u64,
    total_rewards: u128,
    allocations: &[Disbursement],
) -> InvariantResult {
    let mut allocated: u128 = 0;
    for d in allocations {
        match allocated.checked_add(d.allocated_amount) {
            Some(v) => allocated = v,
            None => {
                return InvariantResult::Anomaly(LedgerAnomaly {
                    kind: AnomalyKind::AllocationBound,
                    expected: total_rewards,
                    actual: u128::MAX,
                    message: format!(
                        "LEDGER_ANOMALY: arithmetic overflow summing allocations for epoch {epoch}"
                    ),
                });
            }
        }
    }

    if allocated <= total_rewards {
        InvariantResult::Holds
    } else {
        InvariantResult::Anomaly(LedgerAnomaly {
            kind: AnomalyKind::AllocationBound,
            expected: total_rewards,
            actual: allocated,
            message: format!(
                "LEDGER_ANOMALY: epoch {epoch} allocations {allocated} exceed total rewards {total_rewards}"
            ),
        })
    }
}
