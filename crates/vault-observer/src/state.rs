//! Shared application state for the query API server.

use vault_ingest::{LedgerView, SharedView};
use vault_ledger::EpochClock;
use vault_types::IngestStatus;

/// Shared state for the Axum application.
///
/// Wrapped in [`std::sync::Arc`] and injected via Axum's `State`
/// extractor. The view is written only by the ingestion worker.
#[derive(Clone)]
pub struct AppState {
    /// The latest committed ledger view.
    pub view: SharedView,
}

impl AppState {
    /// Serve an existing shared view.
    pub const fn new(view: SharedView) -> Self {
        Self { view }
    }

    /// State with an empty genesis view, for tests and startup.
    pub fn genesis(clock: EpochClock) -> Self {
        Self::new(vault_ingest::shared_view(clock))
    }

    /// Replace the committed view.
    pub async fn publish(&self, view: LedgerView) {
        *self.view.write().await = view;
    }

    /// Current ingestion status.
    pub async fn status(&self) -> IngestStatus {
        self.view.read().await.status.clone()
    }
}
