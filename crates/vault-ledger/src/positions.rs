//! Vault Position Tracker.
//!
//! Tracks the amount held by each open vault position. Positions are
//! created on deposit, shrink on partial withdrawal, and disappear once
//! withdrawn to zero. Score changes caused by deposits and withdrawals
//! arrive as separate `AdjustedHoldings` events; nothing here touches the
//! roster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vault_types::{MemberId, PositionId, VaultAsset, VaultPosition};

use crate::LedgerError;

/// Result of a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    /// The position was withdrawn to zero and removed.
    Closed(VaultPosition),
    /// The position remains open with a new amount.
    Reduced {
        /// Amount before the withdrawal.
        previous: u128,
        /// Amount after the withdrawal.
        remaining: u128,
    },
}

/// Open positions, keyed by asset then position id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTracker {
    positions: BTreeMap<VaultAsset, BTreeMap<PositionId, VaultPosition>>,
}

impl PositionTracker {
    /// Create an empty tracker.
    pub const fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
        }
    }

    /// Open a new position.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicatePosition`] if the id is already open
    /// for this asset.
    pub fn deposit(
        &mut self,
        asset: VaultAsset,
        position_id: PositionId,
        owner: MemberId,
        amount: u128,
        epoch: u64,
    ) -> Result<&VaultPosition, LedgerError> {
        let book = self.positions.entry(asset).or_default();
        match book.entry(position_id) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(LedgerError::DuplicatePosition { asset, position_id })
            }
            std::collections::btree_map::Entry::Vacant(slot) => Ok(slot.insert(VaultPosition {
                id: position_id,
                asset,
                owner,
                amount,
                deposited_at_epoch: epoch,
            })),
        }
    }

    /// Withdraw from a position, leaving `remaining_amount` in it.
    ///
    /// A remaining amount of zero closes the position.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownPosition`] if the position is not open.
    pub fn withdraw(
        &mut self,
        asset: VaultAsset,
        position_id: PositionId,
        remaining_amount: u128,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let unknown = LedgerError::UnknownPosition { asset, position_id };
        let book = self.positions.get_mut(&asset).ok_or_else(|| unknown.clone())?;

        if remaining_amount == 0 {
            let closed = book.remove(&position_id).ok_or(unknown)?;
            if book.is_empty() {
                self.positions.remove(&asset);
            }
            return Ok(WithdrawalOutcome::Closed(closed));
        }

        let position = book.get_mut(&position_id).ok_or(unknown)?;
        let previous = position.amount;
        position.amount = remaining_amount;
        Ok(WithdrawalOutcome::Reduced {
            previous,
            remaining: remaining_amount,
        })
    }

    /// Look up an open position.
    pub fn get(&self, asset: VaultAsset, position_id: PositionId) -> Option<&VaultPosition> {
        self.positions.get(&asset)?.get(&position_id)
    }

    /// All open positions owned by `owner`, GFI first, in id order.
    pub fn owned_by<'a>(&'a self, owner: &'a MemberId) -> impl Iterator<Item = &'a VaultPosition> {
        self.positions
            .values()
            .flat_map(BTreeMap::values)
            .filter(move |p| &p.owner == owner)
    }

    /// Number of open positions across both assets.
    pub fn len(&self) -> usize {
        self.positions.values().map(BTreeMap::len).sum()
    }

    /// Whether no positions are open.
    pub fn is_empty(&self) -> bool {
        self.positions.values().all(BTreeMap::is_empty)
    }

    /// Total amount held by open positions of `asset`, saturating at `u128::MAX`.
    pub fn total_held(&self, asset: VaultAsset) -> u128 {
        self.positions
            .get(&asset)
            .map_or(0, |book| {
                book.values().fold(0_u128, |acc, p| acc.saturating_add(p.amount))
            })
    }
}
