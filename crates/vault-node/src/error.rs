//! Error types for the vault node binary.
//!
//! [`NodeError`] is the top-level error type that wraps all possible
//! failure modes during node startup and ingestion.

/// Top-level error for the vault node binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: vault_ingest::ConfigError,
    },

    /// Ledger construction failed.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: vault_ledger::LedgerError,
    },

    /// The upstream source could not be opened.
    #[error("source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: vault_ingest::SourceError,
    },

    /// Query API server failed.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: vault_observer::ServerError,
    },

    /// A background task panicked or was cancelled.
    #[error("task error: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
