//! Upstream chain events and their ordering envelope.
//!
//! Events are the source of truth. The ledger is a projection that can be
//! rebuilt at any time by folding the canonical event sequence from
//! genesis. Each event arrives wrapped in an [`EventEnvelope`] that pins
//! its position in the chain: block height first, then log index within
//! the block.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{MemberId, PositionId};

/// Position of an event in the canonical chain.
///
/// Ordering is lexicographic: block height, then intra-block log index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct EventCursor {
    /// Block height of the emitting transaction.
    pub block_height: u64,
    /// Log index within the block.
    pub log_index: u32,
}

impl core::fmt::Display for EventCursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.block_height, self.log_index)
    }
}

/// A state-changing event emitted by the vault contracts.
///
/// Score values arrive pre-computed by the emitting system; the ledger
/// never derives them from deposit amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "bindings/")]
pub enum VaultEvent {
    /// A member's scores were set by the vault.
    AdjustedHoldings {
        /// Member whose holdings changed.
        member: MemberId,
        /// New eligible score.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        eligible_amount: u128,
        /// New next-epoch score.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        next_epoch_amount: u128,
    },

    /// Authoritative roster totals published by the vault.
    VaultTotalUpdate {
        /// Authoritative eligible total.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        eligible_total: u128,
        /// Authoritative next-epoch total.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        next_epoch_total: u128,
    },

    /// Request to rotate scores if a new epoch has begun.
    Checkpoint {
        /// Timestamp of the block containing the checkpoint.
        block_timestamp: u64,
    },

    /// Rewards for a completed epoch were fixed.
    EpochFinalized {
        /// Index of the finalized epoch.
        epoch: u64,
        /// Total rewards issued for the epoch.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        total_rewards: u128,
        /// Timestamp of the block containing the finalization.
        block_timestamp: u64,
    },

    /// GFI was deposited into a new vault position.
    GfiDeposit {
        /// Newly minted position token.
        position_id: PositionId,
        /// Depositing member.
        owner: MemberId,
        /// Deposited GFI amount.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        amount: u128,
        /// Timestamp of the deposit.
        deposit_timestamp: u64,
    },

    /// GFI was withdrawn from a position, leaving `remaining_amount`.
    GfiWithdrawal {
        /// Position being withdrawn from.
        position_id: PositionId,
        /// Amount left in the position after the withdrawal.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        remaining_amount: u128,
    },

    /// Capital was deposited into a new vault position.
    CapitalDeposit {
        /// Newly minted position token.
        position_id: PositionId,
        /// Depositing member.
        owner: MemberId,
        /// USDC value of the deposited capital.
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        usdc_equivalent: u128,
        /// Timestamp of the deposit.
        deposit_timestamp: u64,
    },

    /// A capital position was withdrawn in full.
    CapitalWithdrawal {
        /// Position being withdrawn.
        position_id: PositionId,
    },

    /// A member claimed part of an epoch's allocation.
    RewardPaid {
        /// Claiming member.
        member: MemberId,
        /// Epoch the claim draws from.
        epoch: u64,
        /// Amount claimed by this event (a delta, not a running total).
        #[serde(with = "crate::amount")]
        #[ts(type = "string")]
        claimed_amount: u128,
    },
}

impl VaultEvent {
    /// Short event name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AdjustedHoldings { .. } => "AdjustedHoldings",
            Self::VaultTotalUpdate { .. } => "VaultTotalUpdate",
            Self::Checkpoint { .. } => "Checkpoint",
            Self::EpochFinalized { .. } => "EpochFinalized",
            Self::GfiDeposit { .. } => "GfiDeposit",
            Self::GfiWithdrawal { .. } => "GfiWithdrawal",
            Self::CapitalDeposit { .. } => "CapitalDeposit",
            Self::CapitalWithdrawal { .. } => "CapitalWithdrawal",
            Self::RewardPaid { .. } => "RewardPaid",
        }
    }
}

/// An event together with its chain position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Block height of the emitting transaction.
    pub block_height: u64,
    /// Log index within the block.
    pub log_index: u32,
    /// The event payload.
    pub event: VaultEvent,
}

impl EventEnvelope {
    /// Wrap an event at the given chain position.
    pub const fn new(block_height: u64, log_index: u32, event: VaultEvent) -> Self {
        Self {
            block_height,
            log_index,
            event,
        }
    }

    /// The envelope's position in the chain.
    pub const fn cursor(&self) -> EventCursor {
        EventCursor {
            block_height: self.block_height,
            log_index: self.log_index,
        }
    }
}

/// A message read from the upstream event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamMessage {
    /// A new canonical event.
    Event(EventEnvelope),
    /// The chain reorganized: every event at or above `from_height` is
    /// no longer canonical and must be retracted.
    Reorg {
        /// First block height that is no longer canonical.
        from_height: u64,
    },
}
