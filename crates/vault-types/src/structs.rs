//! Ledger records derived from the vault event stream.
//!
//! These are plain data records. The rules that create and mutate them
//! live in `vault-ledger`; this crate only fixes their shape so the
//! query layer and the dashboard agree on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::VaultAsset;
use crate::ids::{MemberId, PositionId};

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A vault member's reward weights.
///
/// Created on the first holdings adjustment and never deleted; a member
/// who withdraws everything simply decays to zero scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Member {
    /// Account address.
    pub id: MemberId,
    /// Weight used to pro-rate rewards in the current epoch.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub eligible_score: u128,
    /// Accruing weight that becomes eligible at the next rotation.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub next_epoch_score: u128,
}

impl Member {
    /// Create a member with both scores at zero.
    pub const fn new(id: MemberId) -> Self {
        Self {
            id,
            eligible_score: 0,
            next_epoch_score: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Vault position
// ---------------------------------------------------------------------------

/// An open vault position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VaultPosition {
    /// Token id of the position.
    pub id: PositionId,
    /// Asset the position holds.
    pub asset: VaultAsset,
    /// Member who owns the position.
    pub owner: MemberId,
    /// Deposited amount still held (GFI units, or USDC equivalent for capital).
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub amount: u128,
    /// Epoch in which the deposit landed.
    pub deposited_at_epoch: u64,
}

// ---------------------------------------------------------------------------
// Epoch
// ---------------------------------------------------------------------------

/// A finalized reward epoch. Immutable once recorded.
///
/// The score snapshot is taken at finalization time and is never
/// recomputed, even if later events change the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Epoch {
    /// Epoch index.
    pub index: u64,
    /// Total rewards issued for the epoch.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_rewards: u128,
    /// Block timestamp of the finalization event.
    pub finalized_at_timestamp: u64,
    /// Roster eligible total at finalization.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub eligible_score_total: u128,
    /// Eligible score of every member with a non-zero score at finalization.
    #[serde(with = "crate::amount::map")]
    #[ts(type = "Record<string, string>")]
    pub eligible_scores: BTreeMap<MemberId, u128>,
}

// ---------------------------------------------------------------------------
// Disbursement
// ---------------------------------------------------------------------------

/// One member's reward allocation for one finalized epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Disbursement {
    /// Receiving member.
    pub member: MemberId,
    /// Epoch the allocation belongs to.
    pub epoch: u64,
    /// Pro-rata share of the epoch rewards (floored).
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub allocated_amount: u128,
    /// Block timestamp at which the allocation was made.
    pub allocated_at_timestamp: u64,
    /// Amount claimed so far. Never exceeds `allocated_amount`.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub claimed_amount: u128,
}

impl Disbursement {
    /// Amount still available to claim.
    pub const fn claimable(&self) -> u128 {
        self.allocated_amount.saturating_sub(self.claimed_amount)
    }
}
