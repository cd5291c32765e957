//! The ledger aggregate root and its transition function.
//!
//! [`LedgerState::apply`] is the pure fold step `(State, Event) -> State'`:
//! each event type triggers exactly one transition across the components,
//! and a failing event leaves the state untouched. Replaying the same
//! event sequence from [`LedgerState::new`] always yields the same
//! [`LedgerState::canonical_bytes`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use vault_types::{
    EpochSummary, MemberId, MemberSummary, PositionId, RosterSummary, VaultAsset, VaultEvent,
};

use crate::checkpoint::{checkpoint, CheckpointOutcome};
use crate::clock::EpochClock;
use crate::disbursement::{compute_allocations, AllocationSummary, DisbursementBook};
use crate::finalizer::EpochBook;
use crate::membership::{HoldingsChange, Roster};
use crate::positions::{PositionTracker, WithdrawalOutcome};
use crate::LedgerError;

/// What a successfully applied event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A member's scores were set.
    HoldingsAdjusted {
        /// The member.
        member: MemberId,
        /// Previous scores and whether the member is new.
        change: HoldingsChange,
    },
    /// Authoritative totals overwrote the incremental ones.
    TotalsUpdated {
        /// Eligible total before the update.
        previous_eligible: u128,
        /// Next-epoch total before the update.
        previous_next_epoch: u128,
    },
    /// A checkpoint was processed.
    Checkpointed(CheckpointOutcome),
    /// An epoch was finalized and its rewards allocated.
    EpochFinalized {
        /// The epoch index.
        epoch: u64,
        /// Allocation totals.
        allocation: AllocationSummary,
    },
    /// A position was opened.
    PositionOpened {
        /// Asset deposited.
        asset: VaultAsset,
        /// The new position.
        position_id: PositionId,
    },
    /// A position was reduced or closed.
    PositionWithdrawn {
        /// Asset withdrawn.
        asset: VaultAsset,
        /// The position.
        position_id: PositionId,
        /// Whether it was closed or reduced.
        outcome: WithdrawalOutcome,
    },
    /// A claim was recorded.
    RewardClaimed {
        /// The claiming member.
        member: MemberId,
        /// The epoch claimed against.
        epoch: u64,
        /// Amount still claimable afterwards.
        claimable: u128,
    },
}

/// Complete derived state of the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    clock: EpochClock,
    roster: Roster,
    positions: PositionTracker,
    epochs: EpochBook,
    disbursements: DisbursementBook,
}

impl LedgerState {
    /// The genesis state for a given epoch clock.
    pub const fn new(clock: EpochClock) -> Self {
        Self {
            clock,
            roster: Roster::new(),
            positions: PositionTracker::new(),
            epochs: EpochBook::new(),
            disbursements: DisbursementBook::new(),
        }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns the [`LedgerError`] of the component the event targets. The
    /// state is unchanged when an error is returned.
    pub fn apply(&mut self, event: &VaultEvent) -> Result<Transition, LedgerError> {
        match event {
            VaultEvent::AdjustedHoldings {
                member,
                eligible_amount,
                next_epoch_amount,
            } => {
                let change =
                    self.roster
                        .adjust_holdings(member, *eligible_amount, *next_epoch_amount)?;
                Ok(Transition::HoldingsAdjusted {
                    member: member.clone(),
                    change,
                })
            }
            VaultEvent::VaultTotalUpdate {
                eligible_total,
                next_epoch_total,
            } => {
                let (previous_eligible, previous_next_epoch) = self
                    .roster
                    .update_vault_totals(*eligible_total, *next_epoch_total);
                Ok(Transition::TotalsUpdated {
                    previous_eligible,
                    previous_next_epoch,
                })
            }
            VaultEvent::Checkpoint { block_timestamp } => {
                checkpoint(&mut self.roster, &self.clock, *block_timestamp)
                    .map(Transition::Checkpointed)
            }
            VaultEvent::EpochFinalized {
                epoch,
                total_rewards,
                block_timestamp,
            } => self.finalize(*epoch, *total_rewards, *block_timestamp),
            VaultEvent::GfiDeposit {
                position_id,
                owner,
                amount,
                deposit_timestamp,
            } => self.deposit(VaultAsset::Gfi, *position_id, owner, *amount, *deposit_timestamp),
            VaultEvent::CapitalDeposit {
                position_id,
                owner,
                usdc_equivalent,
                deposit_timestamp,
            } => self.deposit(
                VaultAsset::Capital,
                *position_id,
                owner,
                *usdc_equivalent,
                *deposit_timestamp,
            ),
            VaultEvent::GfiWithdrawal {
                position_id,
                remaining_amount,
            } => self.withdraw(VaultAsset::Gfi, *position_id, *remaining_amount),
            VaultEvent::CapitalWithdrawal { position_id } => {
                self.withdraw(VaultAsset::Capital, *position_id, 0)
            }
            VaultEvent::RewardPaid {
                member,
                epoch,
                claimed_amount,
            } => {
                let claimable = self
                    .disbursements
                    .record_claim(member, *epoch, *claimed_amount)?
                    .claimable();
                Ok(Transition::RewardClaimed {
                    member: member.clone(),
                    epoch: *epoch,
                    claimable,
                })
            }
        }
    }

    /// Finalize and allocate as one step: nothing is stored unless both
    /// the snapshot and the allocations are valid.
    fn finalize(
        &mut self,
        epoch: u64,
        total_rewards: u128,
        timestamp: u64,
    ) -> Result<Transition, LedgerError> {
        let record = self
            .epochs
            .prepare(epoch, total_rewards, timestamp, &self.roster)?;
        if self.disbursements.for_epoch(epoch).next().is_some() {
            return Err(LedgerError::DuplicateFinalization { epoch });
        }
        let allocations = compute_allocations(&record)?;

        self.epochs.commit(record)?;
        let allocation = self.disbursements.insert_all(allocations);
        debug!(
            epoch,
            total_rewards = %total_rewards,
            recipients = allocation.recipients,
            total_allocated = %allocation.total_allocated,
            "epoch finalized"
        );
        Ok(Transition::EpochFinalized { epoch, allocation })
    }

    fn deposit(
        &mut self,
        asset: VaultAsset,
        position_id: PositionId,
        owner: &MemberId,
        amount: u128,
        timestamp: u64,
    ) -> Result<Transition, LedgerError> {
        let epoch = self.clock.epoch_of(timestamp);
        self.positions
            .deposit(asset, position_id, owner.clone(), amount, epoch)?;
        Ok(Transition::PositionOpened { asset, position_id })
    }

    fn withdraw(
        &mut self,
        asset: VaultAsset,
        position_id: PositionId,
        remaining_amount: u128,
    ) -> Result<Transition, LedgerError> {
        let outcome = self
            .positions
            .withdraw(asset, position_id, remaining_amount)?;
        Ok(Transition::PositionWithdrawn {
            asset,
            position_id,
            outcome,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The epoch clock.
    pub const fn clock(&self) -> &EpochClock {
        &self.clock
    }

    /// The member roster.
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Open vault positions.
    pub const fn positions(&self) -> &PositionTracker {
        &self.positions
    }

    /// Finalized epochs.
    pub const fn epochs(&self) -> &EpochBook {
        &self.epochs
    }

    /// Disbursements and claims.
    pub const fn disbursements(&self) -> &DisbursementBook {
        &self.disbursements
    }

    /// Deterministic JSON encoding of the whole state.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none is expected for a well-formed
    /// state since every map key serializes to a string.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    // -----------------------------------------------------------------------
    // Read-side summaries
    // -----------------------------------------------------------------------

    /// Roster-wide totals.
    pub fn roster_summary(&self) -> RosterSummary {
        RosterSummary {
            member_count: u64::try_from(self.roster.member_count()).unwrap_or(u64::MAX),
            eligible_score_total: self.roster.eligible_score_total(),
            next_epoch_score_total: self.roster.next_epoch_score_total(),
            last_checkpointed_epoch: self.roster.last_checkpointed_epoch(),
            finalized_epochs: u64::try_from(self.epochs.len()).unwrap_or(u64::MAX),
            gfi_held: self.positions.total_held(VaultAsset::Gfi),
            capital_held: self.positions.total_held(VaultAsset::Capital),
        }
    }

    /// Scores, reward totals and position count for one member, or `None`
    /// if the ledger has never seen the address.
    pub fn member_summary(&self, id: &MemberId) -> Option<MemberSummary> {
        let member = self.roster.member(id);
        let open_positions = self.positions.owned_by(id).count();
        let (total_allocated, total_claimed) = self.disbursements.member_totals(id);
        if member.is_none() && open_positions == 0 && total_allocated == 0 {
            return None;
        }
        Some(MemberSummary {
            id: id.clone(),
            eligible_score: member.map_or(0, |m| m.eligible_score),
            next_epoch_score: member.map_or(0, |m| m.next_epoch_score),
            total_allocated,
            total_claimed,
            open_positions: u64::try_from(open_positions).unwrap_or(u64::MAX),
        })
    }

    /// Rewards and allocation totals for a finalized epoch.
    pub fn epoch_summary(&self, index: u64) -> Option<EpochSummary> {
        let epoch = self.epochs.get(index)?;
        let (total_allocated, total_claimed) = self.disbursements.epoch_totals(index);
        Some(EpochSummary {
            index,
            total_rewards: epoch.total_rewards,
            starts_at_timestamp: self.clock.epoch_start(index),
            finalized_at_timestamp: epoch.finalized_at_timestamp,
            eligible_score_total: epoch.eligible_score_total,
            recipients: u64::try_from(self.disbursements.for_epoch(index).count())
                .unwrap_or(u64::MAX),
            total_allocated,
            total_claimed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WEEK: u64 = 604_800;

    fn addr(n: u8) -> MemberId {
        MemberId::parse(&format!("0x{n:040x}")).unwrap()
    }

    fn ledger() -> LedgerState {
        LedgerState::new(EpochClock::new(WEEK).unwrap())
    }

    fn adjust(member: u8, eligible: u128, next: u128) -> VaultEvent {
        VaultEvent::AdjustedHoldings {
            member: addr(member),
            eligible_amount: eligible,
            next_epoch_amount: next,
        }
    }

    #[test]
    fn deposit_claim_scenario() {
        let mut state = ledger();
        state
            .apply(&VaultEvent::GfiDeposit {
                position_id: PositionId(1),
                owner: addr(1),
                amount: 100,
                deposit_timestamp: 10,
            })
            .unwrap();
        state.apply(&adjust(1, 0, 100)).unwrap();
        state
            .apply(&VaultEvent::Checkpoint {
                block_timestamp: WEEK,
            })
            .unwrap();
        assert_eq!(state.roster().member(&addr(1)).map(|m| m.eligible_score), Some(100));

        let t = state
            .apply(&VaultEvent::EpochFinalized {
                epoch: 1,
                total_rewards: 1000,
                block_timestamp: 2 * WEEK,
            })
            .unwrap();
        assert!(matches!(t, Transition::EpochFinalized { epoch: 1, .. }));

        let t = state
            .apply(&VaultEvent::RewardPaid {
                member: addr(1),
                epoch: 1,
                claimed_amount: 400,
            })
            .unwrap();
        assert_eq!(
            t,
            Transition::RewardClaimed {
                member: addr(1),
                epoch: 1,
                claimable: 600
            }
        );

        let summary = state.member_summary(&addr(1)).unwrap();
        assert_eq!(summary.total_allocated, 1000);
        assert_eq!(summary.total_claimed, 400);
        assert_eq!(summary.open_positions, 1);

        let epoch = state.epoch_summary(1).unwrap();
        assert_eq!(epoch.starts_at_timestamp, Some(WEEK));
        assert_eq!(epoch.finalized_at_timestamp, 2 * WEEK);
        assert_eq!(state.roster_summary().gfi_held, 100);
    }

    #[test]
    fn failed_finalization_leaves_no_trace() {
        let mut state = ledger();
        state.apply(&adjust(1, 50, 50)).unwrap();
        state.apply(&adjust(2, 50, 50)).unwrap();
        state
            .apply(&VaultEvent::VaultTotalUpdate {
                eligible_total: 0,
                next_epoch_total: 100,
            })
            .unwrap();
        let before = state.clone();

        let err = state
            .apply(&VaultEvent::EpochFinalized {
                epoch: 1,
                total_rewards: 1000,
                block_timestamp: WEEK,
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn duplicate_finalization_rejected() {
        let mut state = ledger();
        let finalize = VaultEvent::EpochFinalized {
            epoch: 3,
            total_rewards: 10,
            block_timestamp: 3 * WEEK,
        };
        state.apply(&finalize).unwrap();
        assert_eq!(
            state.apply(&finalize),
            Err(LedgerError::DuplicateFinalization { epoch: 3 })
        );
    }

    #[test]
    fn capital_positions_are_separate_from_gfi() {
        let mut state = ledger();
        for event in [
            VaultEvent::GfiDeposit {
                position_id: PositionId(7),
                owner: addr(1),
                amount: 5,
                deposit_timestamp: 0,
            },
            VaultEvent::CapitalDeposit {
                position_id: PositionId(7),
                owner: addr(1),
                usdc_equivalent: 900,
                deposit_timestamp: 3 * WEEK,
            },
        ] {
            state.apply(&event).unwrap();
        }
        let capital = state.positions().get(VaultAsset::Capital, PositionId(7)).unwrap();
        assert_eq!(capital.deposited_at_epoch, 3);
        let roster = state.roster_summary();
        assert_eq!((roster.gfi_held, roster.capital_held), (5, 900));

        state
            .apply(&VaultEvent::CapitalWithdrawal {
                position_id: PositionId(7),
            })
            .unwrap();
        assert!(state.positions().get(VaultAsset::Capital, PositionId(7)).is_none());
        assert!(state.positions().get(VaultAsset::Gfi, PositionId(7)).is_some());
        assert_eq!(state.roster_summary().capital_held, 0);
        assert!(matches!(
            state.apply(&VaultEvent::CapitalWithdrawal {
                position_id: PositionId(7)
            }),
            Err(LedgerError::UnknownPosition { .. })
        ));
    }

    #[test]
    fn canonical_bytes_round_trip() {
        let mut state = ledger();
        state.apply(&adjust(1, 0, 10)).unwrap();
        state
            .apply(&VaultEvent::Checkpoint {
                block_timestamp: WEEK,
            })
            .unwrap();
        let bytes = state.canonical_bytes().unwrap();
        let decoded: LedgerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.canonical_bytes().unwrap(), bytes);
    }

    #[test]
    fn unknown_member_has_no_summary() {
        let state = ledger();
        assert!(state.member_summary(&addr(9)).is_none());
        assert!(state.epoch_summary(1).is_none());
        assert_eq!(state.roster_summary().member_count, 0);
    }
}
