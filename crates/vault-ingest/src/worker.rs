//! The async ingestion worker and the shared read view.
//!
//! Two tasks cooperate through a bounded queue:
//!
//! - the **fetcher** pulls messages from an [`EventSource`], wrapping each
//!   fetch in a timeout. A timeout is logged and the fetch retried; it
//!   never reaches the projection logic.
//! - the **writer** is the only task that mutates the [`Ingestor`]. It
//!   drains whatever is queued, applies it, and then publishes one
//!   committed [`LedgerView`] for readers.
//!
//! Readers take the [`SharedView`] read lock and never block the writer
//! for longer than one clone-and-swap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use vault_ledger::{EpochClock, LedgerState};
use vault_types::{IngestStatus, StreamMessage};

use crate::ingestor::{IngestStep, Ingestor};
use crate::source::{EventSource, SourceError};
use crate::IngestError;

/// The latest committed ledger state and the status it was committed with.
#[derive(Debug, Clone)]
pub struct LedgerView {
    /// Committed ledger state.
    pub state: LedgerState,
    /// Ingestion status at commit time.
    pub status: IngestStatus,
}

impl LedgerView {
    /// An empty view at genesis.
    pub const fn genesis(clock: EpochClock) -> Self {
        Self {
            state: LedgerState::new(clock),
            status: IngestStatus::genesis(),
        }
    }
}

/// Read view shared between the writer and any number of readers.
pub type SharedView = Arc<RwLock<LedgerView>>;

/// Create a shared view at genesis.
pub fn shared_view(clock: EpochClock) -> SharedView {
    Arc::new(RwLock::new(LedgerView::genesis(clock)))
}

/// Queue and fetch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Bounded queue capacity between fetcher and writer.
    pub queue_capacity: usize,
    /// Per-fetch timeout.
    pub fetch_timeout: Duration,
}

impl From<&crate::config::IngestConfig> for WorkerSettings {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

/// Why the worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The source ran dry and every message was applied.
    Exhausted(IngestStatus),
    /// A fatal error halted ingestion; the view is stale.
    Halted(IngestStatus),
    /// The source failed before it was exhausted.
    SourceFailed {
        /// Description of the source failure.
        reason: String,
        /// Status at the time the worker stopped.
        status: IngestStatus,
    },
}

impl WorkerOutcome {
    /// Final ingestion status.
    pub const fn status(&self) -> &IngestStatus {
        match self {
            Self::Exhausted(status) | Self::Halted(status) | Self::SourceFailed { status, .. } => {
                status
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Pull messages from `source` into `tx` until the source is exhausted or
/// the writer goes away. Returns the number of messages forwarded.
///
/// # Errors
///
/// Returns the [`SourceError`] that stopped the source.
pub async fn run_fetcher<S: EventSource>(
    mut source: S,
    tx: mpsc::Sender<StreamMessage>,
    fetch_timeout: Duration,
) -> Result<u64, SourceError> {
    let mut forwarded: u64 = 0;
    loop {
        match tokio::time::timeout(fetch_timeout, source.next_message()).await {
            Err(_elapsed) => {
                if tx.is_closed() {
                    debug!("writer gone, fetcher stopping");
                    return Ok(forwarded);
                }
                warn!(
                    timeout_ms = u64::try_from(fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                    "upstream fetch timed out, retrying"
                );
            }
            Ok(Ok(Some(message))) => {
                if tx.send(message).await.is_err() {
                    debug!("writer gone, fetcher stopping");
                    return Ok(forwarded);
                }
                forwarded = forwarded.saturating_add(1);
            }
            Ok(Ok(None)) => {
                info!(forwarded, "upstream source exhausted");
                return Ok(forwarded);
            }
            Ok(Err(e)) => {
                error!(error = %e, forwarded, "upstream source failed");
                return Err(e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Apply queued messages and publish committed views until the queue
/// closes or ingestion halts. Returns `true` if ingestion halted.
pub async fn run_writer(
    ingestor: &mut Ingestor,
    mut rx: mpsc::Receiver<StreamMessage>,
    view: &SharedView,
) -> bool {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        let mut halted = false;
        for message in batch {
            match ingestor.handle(message) {
                Ok(IngestStep::Applied { .. }) => {}
                Ok(IngestStep::Retracted(outcome)) => {
                    debug!(retracted = outcome.retracted, "retraction committed");
                }
                Err(IngestError::DuplicateEvent { .. }) => {}
                Err(_) => {
                    halted = true;
                    break;
                }
            }
        }

        publish(ingestor, view).await;
        if halted {
            return true;
        }
    }
    false
}

/// Swap the committed state into the shared view.
pub async fn publish(ingestor: &Ingestor, view: &SharedView) {
    let state = ingestor.state().clone();
    let status = ingestor.status();
    let mut guard = view.write().await;
    guard.state = state;
    guard.status = status;
}

/// Run fetcher and writer until the source is exhausted, the source
/// fails, or ingestion halts.
pub async fn run_worker<S>(
    source: S,
    mut ingestor: Ingestor,
    view: SharedView,
    settings: WorkerSettings,
) -> (Ingestor, WorkerOutcome)
where
    S: EventSource + 'static,
{
    let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
    let fetcher = tokio::spawn(run_fetcher(source, tx, settings.fetch_timeout));

    info!(
        queue_capacity = settings.queue_capacity,
        "ingestion worker started"
    );
    let halted = run_writer(&mut ingestor, rx, &view).await;
    let status = ingestor.status();

    if halted {
        fetcher.abort();
        error!(events_applied = status.events_applied, "ingestion worker halted");
        return (ingestor, WorkerOutcome::Halted(status));
    }

    let outcome = match fetcher.await {
        Ok(Ok(_)) => WorkerOutcome::Exhausted(status),
        Ok(Err(e)) => WorkerOutcome::SourceFailed {
            reason: e.to_string(),
            status,
        },
        Err(e) => WorkerOutcome::SourceFailed {
            reason: format!("fetcher task failed: {e}"),
            status,
        },
    };
    info!(outcome = ?outcome, "ingestion worker stopped");
    (ingestor, outcome)
}
