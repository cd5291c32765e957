//! Epoch Clock: maps block timestamps to epoch indices.
//!
//! Epochs are fixed-length windows counted from the Unix epoch. The
//! length is a protocol constant; changing it would reinterpret every
//! recorded epoch index, so a ledger is always built with one length for
//! its whole history.

use core::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// One week in seconds, the vault's epoch length.
pub const DEFAULT_EPOCH_LENGTH_SECONDS: u64 = 604_800;

const DEFAULT_LENGTH: NonZeroU64 = match NonZeroU64::new(DEFAULT_EPOCH_LENGTH_SECONDS) {
    Some(len) => len,
    None => NonZeroU64::MIN,
};

/// Map a timestamp to its epoch index: `timestamp / epoch_length_seconds`.
///
/// Pure and total; the non-zero length makes division by zero
/// unrepresentable.
pub const fn epoch_of(timestamp: u64, epoch_length_seconds: NonZeroU64) -> u64 {
    #[allow(clippy::arithmetic_side_effects)] // divisor is non-zero
    let epoch = timestamp / epoch_length_seconds.get();
    epoch
}

/// Fixed-length epoch clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    epoch_length_seconds: NonZeroU64,
}

impl EpochClock {
    /// Create a clock with the given epoch length.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidEpochLength`] if the length is zero.
    pub const fn new(epoch_length_seconds: u64) -> Result<Self, LedgerError> {
        match NonZeroU64::new(epoch_length_seconds) {
            Some(len) => Ok(Self {
                epoch_length_seconds: len,
            }),
            None => Err(LedgerError::InvalidEpochLength),
        }
    }

    /// Epoch index containing `timestamp`.
    pub const fn epoch_of(&self, timestamp: u64) -> u64 {
        epoch_of(timestamp, self.epoch_length_seconds)
    }

    /// First timestamp of `epoch`, or `None` if it does not fit in `u64`.
    pub const fn epoch_start(&self, epoch: u64) -> Option<u64> {
        epoch.checked_mul(self.epoch_length_seconds.get())
    }

    /// The configured epoch length.
    pub const fn epoch_length_seconds(&self) -> u64 {
        self.epoch_length_seconds.get()
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self {
            epoch_length_seconds: DEFAULT_LENGTH,
        }
    }
}
