//! Event ingestion for the membership vault ledger.
//!
//! This crate turns an upstream stream of vault events into a committed,
//! read-only ledger view:
//!
//! - [`config`] -- Typed `vault-config.yaml` loading with env overrides.
//! - [`ingestor`] -- The single-writer fold with snapshot and journal
//!   based retraction.
//! - [`source`] -- The [`EventSource`] trait plus file and in-memory
//!   sources.
//! - [`worker`] -- The async fetcher/writer pair and the [`SharedView`]
//!   readers observe.

pub mod config;
pub mod ingestor;
pub mod source;
pub mod worker;

pub use config::{ConfigError, LogFormat, SourceKind, VaultConfig};
pub use ingestor::{IngestSettings, IngestStep, Ingestor, RetractOutcome};
pub use source::{EventSource, FileSource, MemorySource, SourceError};
pub use worker::{
    LedgerView, SharedView, WorkerOutcome, WorkerSettings, run_worker, shared_view,
};

use vault_ledger::LedgerError;
use vault_types::EventCursor;

/// Errors that can occur when ingesting stream messages.
///
/// Everything except [`IngestError::DuplicateEvent`] halts the ingestor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// An envelope at or behind the last applied cursor that does not
    /// match the journaled envelope at its position.
    #[error("event {received} arrived after {last}")]
    OutOfOrder {
        /// Cursor of the last applied envelope.
        last: EventCursor,
        /// Cursor of the rejected envelope.
        received: EventCursor,
    },

    /// An envelope identical to one already applied and still journaled.
    #[error("event {cursor} was already applied")]
    DuplicateEvent {
        /// The repeated cursor.
        cursor: EventCursor,
    },

    /// A retraction reached below the retained history.
    #[error(
        "reorg from height {from_height} precedes retained history at {oldest_retained}; resync from genesis required"
    )]
    ReorgBeyondHistory {
        /// Requested retraction height.
        from_height: u64,
        /// Oldest height a retraction can restore.
        oldest_retained: u64,
    },

    /// The ingestor is halted after an earlier fatal error.
    #[error("ingestion halted: {reason}")]
    Halted {
        /// The error that halted ingestion.
        reason: String,
    },

    /// The ledger rejected an event.
    #[error("event {cursor} rejected: {source}")]
    Ledger {
        /// Cursor of the rejected envelope.
        cursor: EventCursor,
        /// The ledger error.
        source: Box<LedgerError>,
    },
}
