//! Shared type definitions for the membership vault reward ledger.
//!
//! This crate is the single source of truth for the records, events, and
//! query payloads used across the workspace. Types flow downstream to
//! `TypeScript` via `ts-rs` for the rewards dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Member addresses and position token identifiers
//! - [`amount`] -- String encoding for `u128` token amounts
//! - [`enums`] -- Vault asset kinds and ingestion health
//! - [`structs`] -- Ledger records (members, positions, epochs, disbursements)
//! - [`events`] -- Upstream chain events and their ordering envelope
//! - [`query`] -- Read-only payloads served to the query layer

pub mod amount;
pub mod enums;
pub mod events;
pub mod ids;
pub mod query;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{IngestHealth, VaultAsset};
pub use events::{EventCursor, EventEnvelope, StreamMessage, VaultEvent};
pub use ids::{IdError, MemberId, PositionId};
pub use query::{
    ClaimablePoint, EpochSummary, IngestStatus, MemberSummary, QueryResponse, RosterSummary,
};
pub use structs::{Disbursement, Epoch, Member, VaultPosition};
