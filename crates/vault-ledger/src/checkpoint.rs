//! Checkpoint Rotator: the once-per-epoch score rotation.
//!
//! The rotator is a two-state machine per epoch, *awaiting checkpoint* and
//! *checkpointed*, and only ever moves forward in epoch index. The first
//! checkpoint observed in a new epoch promotes every member's next-epoch
//! score to eligible; every later checkpoint in the same epoch is a no-op.
//!
//! If several epochs pass without a checkpoint, the next one still rotates
//! exactly once using the current next-epoch scores. Skipped epochs are
//! not reconstructed.

use tracing::debug;

use crate::clock::EpochClock;
use crate::invariants::verify_next_epoch_sum;
use crate::membership::Roster;
use crate::LedgerError;

/// Result of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// Scores were rotated into a new epoch.
    Rotated {
        /// Epoch of the previous rotation.
        previous_epoch: u64,
        /// Epoch rotated into.
        epoch: u64,
        /// Number of epochs skipped without a checkpoint.
        skipped_epochs: u64,
        /// Number of members rotated.
        members: usize,
    },
    /// The roster was already checkpointed for this epoch.
    AlreadyCheckpointed {
        /// The current epoch.
        epoch: u64,
    },
}

/// Apply a checkpoint observed at `timestamp`.
///
/// # Errors
///
/// - [`LedgerError::CheckpointRegression`] if `timestamp` maps to an epoch
///   before the last rotation.
/// - [`LedgerError::InvariantViolation`] if the next-epoch total does not
///   equal the sum of member next-epoch scores; rotating would break the
///   eligible-sum invariant. The roster is left untouched.
pub fn checkpoint(
    roster: &mut Roster,
    clock: &EpochClock,
    timestamp: u64,
) -> Result<CheckpointOutcome, LedgerError> {
    let epoch = clock.epoch_of(timestamp);
    let last = roster.last_checkpointed_epoch();

    if epoch == last {
        debug!(epoch, "checkpoint already applied for epoch");
        return Ok(CheckpointOutcome::AlreadyCheckpointed { epoch });
    }
    if epoch < last {
        return Err(LedgerError::CheckpointRegression {
            last,
            requested: epoch,
        });
    }

    verify_next_epoch_sum(roster).into_result()?;

    roster.rotate(epoch);
    let skipped_epochs = epoch.saturating_sub(last).saturating_sub(1);
    debug!(
        previous_epoch = last,
        epoch,
        skipped_epochs,
        members = roster.member_count(),
        "rotated scores"
    );

    Ok(CheckpointOutcome::Rotated {
        previous_epoch: last,
        epoch,
        skipped_epochs,
        members: roster.member_count(),
    })
}
