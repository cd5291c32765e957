//! Read-only query API for the membership vault ledger.
//!
//! This crate provides an Axum HTTP server exposing the read interface:
//! roster totals, per-member scores, disbursements, positions, the
//! cumulative claimable series, and finalized epochs.
//!
//! # Architecture
//!
//! Handlers read the latest committed [`LedgerView`] through the
//! [`SharedView`] published by the ingestion worker. Reads never observe
//! a half-applied event. When ingestion has halted, every response carries
//! `x-ledger-stale: true` and the embedded status says why, so clients can
//! show a degraded indicator instead of silently trusting stale numbers.
//!
//! [`LedgerView`]: vault_ingest::LedgerView
//! [`SharedView`]: vault_ingest::SharedView

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::{STALE_HEADER, build_router};
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
