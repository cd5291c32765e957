//! Payloads served by the read-only query layer.
//!
//! Every response is wrapped in a [`QueryResponse`] that carries the
//! ingestion status, so clients can show a stale-data indicator whenever
//! ingestion has halted instead of trusting possibly inconsistent state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::IngestHealth;
use crate::events::EventCursor;
use crate::ids::MemberId;

/// Ingestion progress and health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IngestStatus {
    /// Whether ingestion is running or halted.
    pub health: IngestHealth,
    /// Cursor of the last applied event.
    pub head: Option<EventCursor>,
    /// Number of events currently folded into the ledger.
    pub events_applied: u64,
    /// Number of reorg retractions performed since genesis or the last reset.
    pub retractions: u64,
    /// Wall-clock time the served view was last committed.
    pub committed_at: Option<DateTime<Utc>>,
}

impl IngestStatus {
    /// Status of a ledger that has not applied anything yet.
    pub const fn genesis() -> Self {
        Self {
            health: IngestHealth::Healthy,
            head: None,
            events_applied: 0,
            retractions: 0,
            committed_at: None,
        }
    }

    /// Whether the served state may be stale.
    pub const fn is_stale(&self) -> bool {
        self.health.is_halted()
    }
}

/// A query result paired with the ingestion status it was read under.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct QueryResponse<T> {
    /// `true` when ingestion has halted and `data` may be stale.
    pub stale: bool,
    /// Ingestion status at read time.
    pub status: IngestStatus,
    /// The query result.
    pub data: T,
}

impl<T> QueryResponse<T> {
    /// Wrap `data` with the status it was read under.
    pub fn new(status: IngestStatus, data: T) -> Self {
        Self {
            stale: status.is_stale(),
            status,
            data,
        }
    }
}

/// Aggregate roster figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RosterSummary {
    /// Number of members ever seen.
    pub member_count: u64,
    /// Current eligible total.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub eligible_score_total: u128,
    /// Current next-epoch total.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub next_epoch_score_total: u128,
    /// Epoch of the most recent rotation.
    pub last_checkpointed_epoch: u64,
    /// Number of finalized epochs.
    pub finalized_epochs: u64,
    /// GFI held by open vault positions.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub gfi_held: u128,
    /// Capital (USDC equivalent) held by open vault positions.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub capital_held: u128,
}

/// A member's scores and reward totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MemberSummary {
    /// Account address.
    pub id: MemberId,
    /// Current eligible score.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub eligible_score: u128,
    /// Current next-epoch score.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub next_epoch_score: u128,
    /// Sum of all allocations across finalized epochs.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_allocated: u128,
    /// Sum of all claims.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_claimed: u128,
    /// Number of open vault positions.
    pub open_positions: u64,
}

/// A finalized epoch with allocation totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EpochSummary {
    /// Epoch index.
    pub index: u64,
    /// Total rewards issued.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_rewards: u128,
    /// First timestamp of the epoch; `None` if it overflows `u64`.
    pub starts_at_timestamp: Option<u64>,
    /// Finalization block timestamp.
    pub finalized_at_timestamp: u64,
    /// Eligible total snapshot used for pro-ration.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub eligible_score_total: u128,
    /// Number of members that received an allocation.
    pub recipients: u64,
    /// Sum of all allocations (at most `total_rewards`).
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_allocated: u128,
    /// Sum of all claims against this epoch.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub total_claimed: u128,
}

/// One point of a member's cumulative claimable series, one per epoch in
/// which the member received an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClaimablePoint {
    /// Epoch index.
    pub epoch: u64,
    /// Allocation block timestamp (x-axis for charts).
    pub timestamp: u64,
    /// Allocations summed up to and including this epoch.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub cumulative_allocated: u128,
    /// Claims against epochs up to and including this one.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub cumulative_claimed: u128,
    /// `cumulative_allocated - cumulative_claimed`.
    #[serde(with = "crate::amount")]
    #[ts(type = "string")]
    pub cumulative_claimable: u128,
}
