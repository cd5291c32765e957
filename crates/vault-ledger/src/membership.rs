//! Membership Ledger: per-member scores and the roster aggregate.
//!
//! The [`Roster`] is the aggregate root for member records. It is an
//! explicit value owned by whoever drives ingestion; there is no global
//! instance. Roster totals are maintained by incremental deltas on every
//! holdings adjustment, which keeps them exactly equal to a full
//! resummation of member scores. An authoritative `VaultTotalUpdate`
//! overwrites them outright.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vault_types::{Member, MemberId};

use crate::LedgerError;

/// What a holdings adjustment changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingsChange {
    /// Whether the member was first seen by this adjustment.
    pub new_member: bool,
    /// Eligible score before the adjustment.
    pub previous_eligible: u128,
    /// Next-epoch score before the adjustment.
    pub previous_next_epoch: u128,
}

/// The roster of all members and their aggregate scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    members: BTreeMap<MemberId, Member>,
    #[serde(with = "vault_types::amount")]
    eligible_score_total: u128,
    #[serde(with = "vault_types::amount")]
    next_epoch_score_total: u128,
    last_checkpointed_epoch: u64,
}

/// `total - old + new`, checked.
fn rebalance(total: u128, old: u128, new: u128, what: &'static str) -> Result<u128, LedgerError> {
    total
        .checked_add(new)
        .and_then(|t| t.checked_sub(old))
        .ok_or(LedgerError::ArithmeticOverflow(what))
}

impl Roster {
    /// Create an empty roster that has never rotated.
    pub const fn new() -> Self {
        Self {
            members: BTreeMap::new(),
            eligible_score_total: 0,
            next_epoch_score_total: 0,
            last_checkpointed_epoch: 0,
        }
    }

    /// Set a member's scores to the values carried by the event.
    ///
    /// Inserts the member on first sight and moves both roster totals by
    /// the difference between the old and new scores.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if a total would
    /// overflow or drop below zero (possible only after an authoritative
    /// total disagreed with member scores).
    pub fn adjust_holdings(
        &mut self,
        member: &MemberId,
        eligible_amount: u128,
        next_epoch_amount: u128,
    ) -> Result<HoldingsChange, LedgerError> {
        let (new_member, previous_eligible, previous_next_epoch) = self
            .members
            .get(member)
            .map_or((true, 0, 0), |m| (false, m.eligible_score, m.next_epoch_score));

        let eligible_total = rebalance(
            self.eligible_score_total,
            previous_eligible,
            eligible_amount,
            "eligible score total",
        )?;
        let next_epoch_total = rebalance(
            self.next_epoch_score_total,
            previous_next_epoch,
            next_epoch_amount,
            "next-epoch score total",
        )?;

        let record = self
            .members
            .entry(member.clone())
            .or_insert_with(|| Member::new(member.clone()));
        record.eligible_score = eligible_amount;
        record.next_epoch_score = next_epoch_amount;
        self.eligible_score_total = eligible_total;
        self.next_epoch_score_total = next_epoch_total;

        Ok(HoldingsChange {
            new_member,
            previous_eligible,
            previous_next_epoch,
        })
    }

    /// Overwrite both totals with authoritative values from the vault.
    ///
    /// Returns the previous `(eligible, next_epoch)` totals.
    pub const fn update_vault_totals(
        &mut self,
        eligible_total: u128,
        next_epoch_total: u128,
    ) -> (u128, u128) {
        let previous = (self.eligible_score_total, self.next_epoch_score_total);
        self.eligible_score_total = eligible_total;
        self.next_epoch_score_total = next_epoch_total;
        previous
    }

    /// Promote every member's next-epoch score to eligible and record the
    /// rotation epoch. Callers enforce the once-per-epoch rule.
    pub(crate) fn rotate(&mut self, epoch: u64) {
        for member in self.members.values_mut() {
            member.eligible_score = member.next_epoch_score;
        }
        self.eligible_score_total = self.next_epoch_score_total;
        self.last_checkpointed_epoch = epoch;
    }

    /// Recompute `(eligible, next_epoch)` totals by full resummation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if a sum overflows.
    pub fn resummed_totals(&self) -> Result<(u128, u128), LedgerError> {
        self.members.values().try_fold((0_u128, 0_u128), |(e, n), m| {
            let e = e
                .checked_add(m.eligible_score)
                .ok_or(LedgerError::ArithmeticOverflow("eligible score resummation"))?;
            let n = n
                .checked_add(m.next_epoch_score)
                .ok_or(LedgerError::ArithmeticOverflow("next-epoch score resummation"))?;
            Ok((e, n))
        })
    }

    /// Look up a member.
    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    /// All members in address order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Number of members ever seen.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Current eligible total.
    pub const fn eligible_score_total(&self) -> u128 {
        self.eligible_score_total
    }

    /// Current next-epoch total.
    pub const fn next_epoch_score_total(&self) -> u128 {
        self.next_epoch_score_total
    }

    /// Epoch of the most recent rotation (0 before any rotation).
    pub const fn last_checkpointed_epoch(&self) -> u64 {
        self.last_checkpointed_epoch
    }
}
