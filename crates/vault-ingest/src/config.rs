//! Configuration loading and typed config structures for the vault node.
//!
//! The canonical configuration lives in `vault-config.yaml` at the project
//! root. Every field has a default, so an empty or missing file yields a
//! working configuration that replays `events.ndjson` from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level node configuration.
///
/// Mirrors the structure of `vault-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VaultConfig {
    /// Ledger parameters.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Ingestion queue and history retention.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Upstream event source.
    #[serde(default)]
    pub source: SourceConfig,

    /// Query API listener.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VaultConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `source.nats_url`
    /// - `VAULT_EVENT_FILE` overrides `source.path`
    /// - `OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise use defaults (still
    /// applying environment overrides).
    ///
    /// # Errors
    ///
    /// Same as [`VaultConfig::from_file`] when the file exists.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override deployment-specific values with environment variables
    /// when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.source.nats_url = val;
        }
        if let Ok(val) = std::env::var("VAULT_EVENT_FILE") {
            self.source.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("OBSERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.observer.port = port;
            }
        }
    }

    /// Reject values the node cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.epoch_length_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "ledger.epoch_length_seconds",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "ingest.queue_capacity",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.ingest.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ingest.fetch_timeout_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.ingest.snapshot_interval_blocks == 0 {
            return Err(ConfigError::Invalid {
                field: "ingest.snapshot_interval_blocks",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.ingest.max_reorg_depth < self.ingest.snapshot_interval_blocks {
            return Err(ConfigError::Invalid {
                field: "ingest.max_reorg_depth",
                reason: format!(
                    "{} is smaller than snapshot_interval_blocks {}",
                    self.ingest.max_reorg_depth, self.ingest.snapshot_interval_blocks
                ),
            });
        }
        match self.source.kind {
            SourceKind::File if self.source.path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid {
                    field: "source.path",
                    reason: "file source needs a path".to_owned(),
                })
            }
            SourceKind::Nats if self.source.subject.is_empty() => Err(ConfigError::Invalid {
                field: "source.subject",
                reason: "NATS source needs a subject".to_owned(),
            }),
            SourceKind::File | SourceKind::Nats => Ok(()),
        }
    }
}

/// Ledger parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Epoch length in seconds.
    #[serde(default = "default_epoch_length_seconds")]
    pub epoch_length_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            epoch_length_seconds: default_epoch_length_seconds(),
        }
    }
}

/// Ingestion queue and history retention.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the bounded queue between fetcher and writer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Milliseconds to wait for the next upstream message before logging
    /// a timeout and retrying.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Take a full-state snapshot every N blocks.
    #[serde(default = "default_snapshot_interval_blocks")]
    pub snapshot_interval_blocks: u64,

    /// Blocks of history retained behind the head for retraction.
    #[serde(default = "default_max_reorg_depth")]
    pub max_reorg_depth: u64,
}

impl IngestConfig {
    /// The fetch timeout as a [`Duration`].
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            snapshot_interval_blocks: default_snapshot_interval_blocks(),
            max_reorg_depth: default_max_reorg_depth(),
        }
    }
}

/// Which upstream feed to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Newline-delimited JSON file.
    #[default]
    File,
    /// NATS subject subscription.
    Nats,
}

/// Upstream event source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Source kind.
    #[serde(default)]
    pub kind: SourceKind,

    /// Path of the NDJSON event file (file source).
    #[serde(default = "default_event_file")]
    pub path: PathBuf,

    /// NATS server URL (NATS source).
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS subject carrying stream messages (NATS source).
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: default_event_file(),
            nats_url: default_nats_url(),
            subject: default_subject(),
        }
    }
}

/// Query API listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_epoch_length_seconds() -> u64 {
    vault_ledger::DEFAULT_EPOCH_LENGTH_SECONDS
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_fetch_timeout_ms() -> u64 {
    5_000
}

const fn default_snapshot_interval_blocks() -> u64 {
    64
}

const fn default_max_reorg_depth() -> u64 {
    256
}

fn default_event_file() -> PathBuf {
    PathBuf::from("events.ndjson")
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_subject() -> String {
    "vault.events".to_owned()
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = VaultConfig::default();
        assert_eq!(config.ledger.epoch_length_seconds, 604_800);
        assert_eq!(config.ingest.queue_capacity, 1024);
        assert_eq!(config.ingest.max_reorg_depth, 256);
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
ledger:
  epoch_length_seconds: 86400

ingest:
  queue_capacity: 16
  fetch_timeout_ms: 250
  snapshot_interval_blocks: 8
  max_reorg_depth: 32

source:
  kind: nats
  subject: "vault.mainnet"

observer:
  host: "127.0.0.1"

logging:
  level: "debug"
  format: json
"#;
        let config = VaultConfig::parse(yaml).unwrap();
        assert_eq!(config.ledger.epoch_length_seconds, 86_400);
        assert_eq!(config.ingest.queue_capacity, 16);
        assert_eq!(config.ingest.fetch_timeout(), Duration::from_millis(250));
        assert_eq!(config.source.kind, SourceKind::Nats);
        assert_eq!(config.source.subject, "vault.mainnet");
        assert_eq!(config.observer.host, "127.0.0.1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = VaultConfig::parse("ingest:\n  queue_capacity: 4\n").unwrap();
        assert_eq!(config.ingest.queue_capacity, 4);
        assert_eq!(config.ingest.snapshot_interval_blocks, 64);
        assert_eq!(config.ledger.epoch_length_seconds, 604_800);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(VaultConfig::parse("").is_ok());
    }

    #[test]
    fn zero_epoch_length_rejected() {
        let config = VaultConfig::parse("ledger:\n  epoch_length_seconds: 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "ledger.epoch_length_seconds",
                ..
            })
        ));
    }

    #[test]
    fn reorg_depth_must_cover_a_snapshot_interval() {
        let yaml = "ingest:\n  snapshot_interval_blocks: 100\n  max_reorg_depth: 10\n";
        let config = VaultConfig::parse(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "ingest.max_reorg_depth",
                ..
            })
        ));
    }

    #[test]
    fn unknown_source_kind_fails_to_parse() {
        assert!(matches!(
            VaultConfig::parse("source:\n  kind: kafka\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("vault-config.yaml");
        if path.exists() {
            let config = VaultConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
