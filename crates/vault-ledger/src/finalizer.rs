//! Epoch Finalizer: records the rewards issued for completed epochs.
//!
//! Finalization snapshots the roster's eligible total and every non-zero
//! eligible score at the moment the finalization event is applied. The
//! snapshot is never recomputed. Finalization and rotation are
//! independent: an epoch may be finalized before or after the checkpoint
//! that rotated into it, and the snapshot reflects whatever the roster
//! holds at that point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vault_types::Epoch;

use crate::membership::Roster;
use crate::LedgerError;

/// All finalized epochs, by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochBook {
    epochs: BTreeMap<u64, Epoch>,
}

impl EpochBook {
    /// Create an empty book.
    pub const fn new() -> Self {
        Self {
            epochs: BTreeMap::new(),
        }
    }

    /// Build the epoch record for a finalization without storing it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateFinalization`] if `index` is
    /// already finalized.
    pub fn prepare(
        &self,
        index: u64,
        total_rewards: u128,
        timestamp: u64,
        roster: &Roster,
    ) -> Result<Epoch, LedgerError> {
        if self.epochs.contains_key(&index) {
            return Err(LedgerError::DuplicateFinalization { epoch: index });
        }

        let eligible_scores = roster
            .members()
            .filter(|m| m.eligible_score > 0)
            .map(|m| (m.id.clone(), m.eligible_score))
            .collect();

        Ok(Epoch {
            index,
            total_rewards,
            finalized_at_timestamp: timestamp,
            eligible_score_total: roster.eligible_score_total(),
            eligible_scores,
        })
    }

    /// Store a prepared epoch record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateFinalization`] if the index is
    /// already present.
    pub fn commit(&mut self, epoch: Epoch) -> Result<&Epoch, LedgerError> {
        match self.epochs.entry(epoch.index) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(LedgerError::DuplicateFinalization { epoch: epoch.index })
            }
            std::collections::btree_map::Entry::Vacant(slot) => Ok(slot.insert(epoch)),
        }
    }

    /// Finalize an epoch in one step.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateFinalization`] if `index` is
    /// already finalized.
    pub fn finalize(
        &mut self,
        index: u64,
        total_rewards: u128,
        timestamp: u64,
        roster: &Roster,
    ) -> Result<&Epoch, LedgerError> {
        let epoch = self.prepare(index, total_rewards, timestamp, roster)?;
        self.commit(epoch)
    }

    /// Look up a finalized epoch.
    pub fn get(&self, index: u64) -> Option<&Epoch> {
        self.epochs.get(&index)
    }

    /// All finalized epochs in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Epoch> {
        self.epochs.values()
    }

    /// Number of finalized epochs.
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether no epoch has been finalized.
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}
