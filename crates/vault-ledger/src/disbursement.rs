//! Disbursement Tracker: pro-rata reward allocation and claims.
//!
//! When an epoch is finalized, every member with a non-zero eligible score
//! in the epoch's snapshot receives a disbursement of
//! `floor(score * total_rewards / eligible_score_total)`. Members with zero
//! score get no record at all: absence means "did not participate".
//! Claims arrive later as `RewardPaid` events and accumulate against the
//! allocation; a claim beyond the allocation is fatal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vault_types::{ClaimablePoint, Disbursement, Epoch, MemberId};

use crate::invariants::verify_allocation_bound;
use crate::math::mul_div_floor;
use crate::{AnomalyKind, LedgerAnomaly, LedgerError};

/// Totals of one epoch's allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationSummary {
    /// Number of members that received a disbursement.
    pub recipients: usize,
    /// Sum of allocated amounts.
    pub total_allocated: u128,
}

/// Compute the disbursements for a finalized epoch without storing them.
///
/// # Errors
///
/// - [`LedgerError::InvariantViolation`] if members hold score but the
///   snapshot total is zero, or if the allocations would exceed the
///   epoch's rewards (the snapshot total was smaller than the member sum).
/// - [`LedgerError::ArithmeticOverflow`] if a share does not fit in `u128`.
pub fn compute_allocations(epoch: &Epoch) -> Result<Vec<Disbursement>, LedgerError> {
    if epoch.eligible_scores.is_empty() {
        return Ok(Vec::new());
    }
    if epoch.eligible_score_total == 0 {
        return Err(LedgerError::InvariantViolation(LedgerAnomaly {
            kind: AnomalyKind::EmptyEligibleTotal,
            expected: 0,
            actual: epoch.eligible_scores.values().fold(0, |a, s| a.saturating_add(*s)),
            message: format!(
                "LEDGER_ANOMALY: epoch {} has {} scored members but a zero eligible total",
                epoch.index,
                epoch.eligible_scores.len()
            ),
        }));
    }

    let allocations = epoch
        .eligible_scores
        .iter()
        .map(|(member, score)| -> Result<Disbursement, LedgerError> {
            let allocated_amount =
                mul_div_floor(*score, epoch.total_rewards, epoch.eligible_score_total)
                    .ok_or(LedgerError::ArithmeticOverflow("pro-rata allocation"))?;
            Ok(Disbursement {
                member: member.clone(),
                epoch: epoch.index,
                allocated_amount,
                allocated_at_timestamp: epoch.finalized_at_timestamp,
                claimed_amount: 0,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    verify_allocation_bound(epoch.index, epoch.total_rewards, &allocations).into_result()?;
    Ok(allocations)
}

/// Every disbursement, keyed by member then epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementBook {
    by_member: BTreeMap<MemberId, BTreeMap<u64, Disbursement>>,
}

impl DisbursementBook {
    /// Create an empty book.
    pub const fn new() -> Self {
        Self {
            by_member: BTreeMap::new(),
        }
    }

    /// Allocate a finalized epoch's rewards.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateFinalization`] if the epoch already
    /// has disbursements, or any error from [`compute_allocations`].
    pub fn allocate(&mut self, epoch: &Epoch) -> Result<AllocationSummary, LedgerError> {
        if self.for_epoch(epoch.index).next().is_some() {
            return Err(LedgerError::DuplicateFinalization { epoch: epoch.index });
        }
        let allocations = compute_allocations(epoch)?;
        Ok(self.insert_all(allocations))
    }

    /// Store computed allocations. Callers guarantee the epoch is new.
    pub(crate) fn insert_all(&mut self, allocations: Vec<Disbursement>) -> AllocationSummary {
        let recipients = allocations.len();
        let mut total_allocated: u128 = 0;
        for d in allocations {
            total_allocated = total_allocated.saturating_add(d.allocated_amount);
            self.by_member
                .entry(d.member.clone())
                .or_default()
                .insert(d.epoch, d);
        }
        AllocationSummary {
            recipients,
            total_allocated,
        }
    }

    /// Record a claim of `claimed_delta` against a disbursement.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownDisbursement`] if the member has no
    ///   disbursement for the epoch.
    /// - [`LedgerError::Overclaim`] if the claim would exceed the allocation.
    pub fn record_claim(
        &mut self,
        member: &MemberId,
        epoch: u64,
        claimed_delta: u128,
    ) -> Result<&Disbursement, LedgerError> {
        let disbursement = self
            .by_member
            .get_mut(member)
            .and_then(|epochs| epochs.get_mut(&epoch))
            .ok_or_else(|| LedgerError::UnknownDisbursement {
                member: member.clone(),
                epoch,
            })?;

        let overclaim = || LedgerError::Overclaim {
            member: member.clone(),
            epoch,
            allocated: disbursement.allocated_amount,
            claimed: disbursement.claimed_amount,
            delta: claimed_delta,
        };
        let claimed = disbursement
            .claimed_amount
            .checked_add(claimed_delta)
            .ok_or_else(overclaim)?;
        if claimed > disbursement.allocated_amount {
            return Err(overclaim());
        }

        disbursement.claimed_amount = claimed;
        Ok(disbursement)
    }

    /// Look up one disbursement.
    pub fn get(&self, member: &MemberId, epoch: u64) -> Option<&Disbursement> {
        self.by_member.get(member)?.get(&epoch)
    }

    /// A member's disbursements in epoch order.
    pub fn for_member<'a>(&'a self, member: &MemberId) -> impl Iterator<Item = &'a Disbursement> {
        self.by_member
            .get(member)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    /// An epoch's disbursements in member order.
    pub fn for_epoch(&self, epoch: u64) -> impl Iterator<Item = &Disbursement> {
        self.by_member
            .values()
            .filter_map(move |epochs| epochs.get(&epoch))
    }

    /// `(allocated, claimed)` summed over a member's disbursements.
    pub fn member_totals(&self, member: &MemberId) -> (u128, u128) {
        self.for_member(member).fold((0, 0), |(a, c), d| {
            (
                a.saturating_add(d.allocated_amount),
                c.saturating_add(d.claimed_amount),
            )
        })
    }

    /// `(allocated, claimed)` summed over an epoch's disbursements.
    pub fn epoch_totals(&self, epoch: u64) -> (u128, u128) {
        self.for_epoch(epoch).fold((0, 0), |(a, c), d| {
            (
                a.saturating_add(d.allocated_amount),
                c.saturating_add(d.claimed_amount),
            )
        })
    }

    /// Cumulative claimable amount for charting, one point per epoch in
    /// which the member received an allocation.
    pub fn claimable_series(&self, member: &MemberId) -> Vec<ClaimablePoint> {
        let mut cumulative_allocated: u128 = 0;
        let mut cumulative_claimed: u128 = 0;
        self.for_member(member)
            .map(|d| {
                cumulative_allocated = cumulative_allocated.saturating_add(d.allocated_amount);
                cumulative_claimed = cumulative_claimed.saturating_add(d.claimed_amount);
                ClaimablePoint {
                    epoch: d.epoch,
                    timestamp: d.allocated_at_timestamp,
                    cumulative_allocated,
                    cumulative_claimed,
                    cumulative_claimable: cumulative_allocated.saturating_sub(cumulative_claimed),
                }
            })
            .collect()
    }
}
