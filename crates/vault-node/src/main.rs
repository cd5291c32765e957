//! Vault ledger node for the membership vault reward system.
//!
//! This is the main entry point that wires together the upstream event
//! feed, the single-writer ingestion worker, and the read-only query API.
//!
//! # Startup Sequence
//!
//! 1. Load and validate configuration from `vault-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the epoch clock and the genesis ledger view
//! 4. Start the query API server
//! 5. Open the upstream source (NDJSON file or NATS subject)
//! 6. Run the ingestion worker until the source ends or ingestion halts
//! 7. Keep serving the last committed view until `Ctrl-C`

mod error;
mod nats_source;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vault_ingest::config::LoggingConfig;
use vault_ingest::{
    FileSource, IngestSettings, Ingestor, LogFormat, SourceKind, VaultConfig, WorkerOutcome,
    WorkerSettings, run_worker, shared_view,
};
use vault_ledger::EpochClock;
use vault_observer::{AppState, ServerConfig, start_server};

use crate::error::NodeError;
use crate::nats_source::NatsSource;

/// Application entry point for the vault node.
///
/// # Errors
///
/// Returns an error if any initialization step fails or a background
/// task dies unexpectedly.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = VaultConfig::load_or_default(&config_path).map_err(NodeError::from)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(path = %config_path.display(), "vault-node starting");
    config.validate().map_err(NodeError::from)?;
    info!(
        epoch_length_seconds = config.ledger.epoch_length_seconds,
        queue_capacity = config.ingest.queue_capacity,
        snapshot_interval_blocks = config.ingest.snapshot_interval_blocks,
        max_reorg_depth = config.ingest.max_reorg_depth,
        source = ?config.source.kind,
        "Configuration loaded"
    );

    // 3. Ledger and shared view.
    let clock = EpochClock::new(config.ledger.epoch_length_seconds).map_err(NodeError::from)?;
    let view = shared_view(clock);
    let ingestor = Ingestor::new(clock, IngestSettings::from(&config.ingest));
    let worker_settings = WorkerSettings::from(&config.ingest);

    // 4. Query API server.
    let app_state = Arc::new(AppState::new(Arc::clone(&view)));
    let server_config = ServerConfig::from(&config.observer);
    let mut server = tokio::spawn(async move {
        start_server(&server_config, app_state, shutdown_signal()).await
    });

    // 5-6. Upstream source and ingestion worker.
    let mut worker = match config.source.kind {
        SourceKind::File => {
            info!(path = %config.source.path.display(), "Replaying events from file");
            let source = FileSource::open(&config.source.path)
                .await
                .map_err(NodeError::from)?;
            tokio::spawn(run_worker(source, ingestor, Arc::clone(&view), worker_settings))
        }
        SourceKind::Nats => {
            info!(
                nats_url = %config.source.nats_url,
                subject = %config.source.subject,
                "Connecting to NATS"
            );
            let source = NatsSource::connect(&config.source.nats_url, &config.source.subject)
                .await
                .map_err(NodeError::from)?;
            tokio::spawn(run_worker(source, ingestor, Arc::clone(&view), worker_settings))
        }
    };

    tokio::select! {
        joined = &mut worker => {
            let (_, outcome) = joined.map_err(|e| NodeError::Task {
                message: format!("ingestion worker: {e}"),
            })?;
            log_outcome(&outcome);
        }
        served = &mut server => {
            worker.abort();
            return finish_server(served);
        }
    }

    // 7. Keep serving the last committed view.
    info!("Serving last committed view until shutdown");
    finish_server(server.await)
}

fn finish_server(
    served: Result<Result<(), vault_observer::ServerError>, tokio::task::JoinError>,
) -> Result<(), Box<dyn std::error::Error>> {
    served
        .map_err(|e| NodeError::Task {
            message: format!("query API: {e}"),
        })?
        .map_err(NodeError::from)?;
    info!("vault-node stopped");
    Ok(())
}

fn log_outcome(outcome: &WorkerOutcome) {
    let status = outcome.status();
    match outcome {
        WorkerOutcome::Exhausted(_) => info!(
            events_applied = status.events_applied,
            retractions = status.retractions,
            head = ?status.head,
            "Upstream source exhausted"
        ),
        WorkerOutcome::Halted(_) => error!(
            health = ?status.health,
            head = ?status.head,
            "Ingestion halted; query API is serving stale data"
        ),
        WorkerOutcome::SourceFailed { reason, .. } => warn!(
            reason = %reason,
            events_applied = status.events_applied,
            "Upstream source failed"
        ),
    }
}

/// Config path from the first argument, `VAULT_CONFIG`, or the default.
fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("VAULT_CONFIG").ok())
        .map_or_else(|| PathBuf::from("vault-config.yaml"), PathBuf::from)
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
