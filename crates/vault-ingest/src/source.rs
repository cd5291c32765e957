//! Upstream event sources.
//!
//! The [`EventSource`] trait abstracts where stream messages come from: a
//! newline-delimited JSON file, an in-memory queue for tests, or a message
//! bus subscription provided by the node binary. Sources only deliver
//! messages; ordering and duplicate checks belong to the ingestor.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use vault_types::StreamMessage;

/// Errors that can occur while reading from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Failed to open or read the underlying file or stream.
    #[error("source I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A line or message payload was not a valid stream message.
    #[error("malformed stream message at {location}: {source}")]
    Decode {
        /// Where the payload came from, e.g. `events.ndjson:12`.
        location: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The transport failed.
    #[error("source transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

/// A source of upstream stream messages.
///
/// `next_message` resolves to `Ok(None)` once the source is exhausted.
/// Callers wrap it in a timeout, so implementations must be cancel-safe:
/// dropping the future must not lose a message.
pub trait EventSource: Send {
    /// Wait for the next message.
    fn next_message(
        &mut self,
    ) -> impl Future<Output = Result<Option<StreamMessage>, SourceError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// A source backed by a queue of messages, used in tests and replays.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    messages: VecDeque<StreamMessage>,
}

impl MemorySource {
    /// Create a source that yields `messages` in order.
    pub fn new(messages: impl IntoIterator<Item = StreamMessage>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
        }
    }

    /// Messages not yet delivered.
    pub fn remaining(&self) -> usize {
        self.messages.len()
    }
}

impl EventSource for MemorySource {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, SourceError> {
        Ok(self.messages.pop_front())
    }
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Reads one JSON [`StreamMessage`] per line. Blank lines are skipped.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: u64,
}

impl FileSource {
    /// Open an NDJSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// Parse one line into a message.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if the line is not a valid message.
    pub fn decode_line(location: &str, line: &str) -> Result<StreamMessage, SourceError> {
        serde_json::from_str(line).map_err(|source| SourceError::Decode {
            location: location.to_owned(),
            source,
        })
    }
}

impl EventSource for FileSource {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, SourceError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number = self.line_number.saturating_add(1);
            if line.trim().is_empty() {
                continue;
            }
            let location = format!("{}:{}", self.path.display(), self.line_number);
            return Self::decode_line(&location, &line).map(Some);
        }
        Ok(None)
    }
}
