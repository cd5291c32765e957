//! The Event Ingestor: a single-writer fold over the vault event stream.
//!
//! The ingestor owns the [`LedgerState`] and applies envelopes strictly in
//! `(block_height, log_index)` order. To support retraction it keeps
//! full-state snapshots every `snapshot_interval_blocks` blocks plus a
//! journal of every envelope applied since the oldest retained snapshot.
//! Retracting from height `h` restores the newest snapshot at or below
//! `h` and re-folds the journaled envelopes below `h`, so the result is
//! byte-identical to a fresh fold of the surviving history.
//!
//! History older than `max_reorg_depth` blocks behind the head is pruned.
//! Any fatal error halts the ingestor; it then rejects everything until
//! [`Ingestor::reset`].

use std::collections::VecDeque;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use vault_ledger::{EpochClock, LedgerState, Transition};
use vault_types::{EventCursor, EventEnvelope, IngestHealth, IngestStatus, StreamMessage};

use crate::IngestError;

/// Snapshot cadence and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Take a snapshot every N blocks.
    pub snapshot_interval_blocks: u64,
    /// Blocks of history retained behind the head.
    pub max_reorg_depth: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            snapshot_interval_blocks: 64,
            max_reorg_depth: 256,
        }
    }
}

impl From<&crate::config::IngestConfig> for IngestSettings {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            snapshot_interval_blocks: config.snapshot_interval_blocks.max(1),
            max_reorg_depth: config.max_reorg_depth,
        }
    }
}

/// Result of a retraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetractOutcome {
    /// First retracted block height.
    pub from_height: u64,
    /// Height of the snapshot the state was restored from.
    pub restored_height: u64,
    /// Envelopes discarded.
    pub retracted: usize,
    /// Journaled envelopes re-applied on top of the snapshot.
    pub replayed: usize,
}

/// What handling one upstream message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStep {
    /// An event was applied.
    Applied {
        /// Position of the event.
        cursor: EventCursor,
        /// The ledger transition.
        transition: Transition,
    },
    /// History was retracted.
    Retracted(RetractOutcome),
}

/// State as of the start of a block: every envelope with
/// `block_height < height` is included.
#[derive(Debug, Clone)]
struct Snapshot {
    height: u64,
    head: Option<EventCursor>,
    events_applied: u64,
    state: LedgerState,
}

/// Single-writer event ingestor.
#[derive(Debug, Clone)]
pub struct Ingestor {
    genesis: LedgerState,
    state: LedgerState,
    settings: IngestSettings,
    snapshots: VecDeque<Snapshot>,
    journal: VecDeque<EventEnvelope>,
    head: Option<EventCursor>,
    events_applied: u64,
    retractions: u64,
    health: IngestHealth,
    committed_at: Option<chrono::DateTime<Utc>>,
}

impl Ingestor {
    /// Create an ingestor at genesis.
    pub fn new(clock: EpochClock, settings: IngestSettings) -> Self {
        let genesis = LedgerState::new(clock);
        let mut ingestor = Self {
            state: genesis.clone(),
            genesis,
            settings,
            snapshots: VecDeque::new(),
            journal: VecDeque::new(),
            head: None,
            events_applied: 0,
            retractions: 0,
            health: IngestHealth::Healthy,
            committed_at: None,
        };
        ingestor.push_genesis_snapshot();
        ingestor
    }

    /// Fold a complete envelope sequence from genesis.
    ///
    /// # Errors
    ///
    /// Returns the first [`IngestError`]; the ingestor is discarded.
    pub fn replay<'a>(
        clock: EpochClock,
        settings: IngestSettings,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope>,
    ) -> Result<Self, IngestError> {
        let mut ingestor = Self::new(clock, settings);
        for envelope in envelopes {
            ingestor.ingest(envelope.clone())?;
        }
        Ok(ingestor)
    }

    fn push_genesis_snapshot(&mut self) {
        self.snapshots.push_back(Snapshot {
            height: 0,
            head: None,
            events_applied: 0,
            state: self.genesis.clone(),
        });
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Handle one upstream message.
    ///
    /// # Errors
    ///
    /// See [`Ingestor::ingest`] and [`Ingestor::retract`].
    pub fn handle(&mut self, message: StreamMessage) -> Result<IngestStep, IngestError> {
        match message {
            StreamMessage::Event(envelope) => {
                let cursor = envelope.cursor();
                self.ingest(envelope)
                    .map(|transition| IngestStep::Applied { cursor, transition })
            }
            StreamMessage::Reorg { from_height } => {
                self.retract(from_height).map(IngestStep::Retracted)
            }
        }
    }

    /// Apply one envelope.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Halted`] if a previous error halted the ingestor.
    /// - [`IngestError::DuplicateEvent`] if an identical envelope is still
    ///   journaled at that cursor. The envelope is ignored and the
    ///   ingestor keeps running.
    /// - [`IngestError::OutOfOrder`] for any other cursor at or behind the
    ///   head: never applied, pruned, or carrying a different payload.
    ///   The ingestor halts.
    /// - [`IngestError::Ledger`] if the ledger rejects the event. The
    ///   ingestor halts.
    pub fn ingest(&mut self, envelope: EventEnvelope) -> Result<Transition, IngestError> {
        self.ensure_running()?;

        let cursor = envelope.cursor();
        if let Some(last) = self.head {
            if cursor <= last {
                if self.journaled(cursor) == Some(&envelope) {
                    warn!(%cursor, head = %last, "duplicate delivery ignored");
                    return Err(IngestError::DuplicateEvent { cursor });
                }
                return Err(self.halt(IngestError::OutOfOrder {
                    last,
                    received: cursor,
                }));
            }
        }

        self.maybe_snapshot(envelope.block_height);

        let transition = match self.state.apply(&envelope.event) {
            Ok(t) => t,
            Err(source) => {
                return Err(self.halt(IngestError::Ledger {
                    cursor,
                    source: Box::new(source),
                }));
            }
        };
        debug!(%cursor, kind = envelope.event.kind(), "event applied");

        self.head = Some(cursor);
        self.events_applied = self.events_applied.saturating_add(1);
        self.committed_at = Some(Utc::now());
        self.journal.push_back(envelope);
        self.prune();
        Ok(transition)
    }

    /// Undo every envelope at or above `from_height`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Halted`] if the ingestor is halted.
    /// - [`IngestError::ReorgBeyondHistory`] if `from_height` precedes the
    ///   oldest retained snapshot. The ingestor halts; recover with
    ///   [`Ingestor::reset`] and a replay from genesis.
    pub fn retract(&mut self, from_height: u64) -> Result<RetractOutcome, IngestError> {
        self.ensure_running()?;

        let oldest_retained = self.snapshots.front().map_or(0, |s| s.height);
        if from_height < oldest_retained {
            return Err(self.halt(IngestError::ReorgBeyondHistory {
                from_height,
                oldest_retained,
            }));
        }

        // Newest snapshot at or below `from_height`; the front one
        // qualifies, so this always finds a snapshot.
        while self.snapshots.len() > 1
            && self.snapshots.back().is_some_and(|s| s.height > from_height)
        {
            self.snapshots.pop_back();
        }
        let Some(snapshot) = self.snapshots.back().cloned() else {
            return Err(self.halt(IngestError::ReorgBeyondHistory {
                from_height,
                oldest_retained,
            }));
        };

        let retracted = self
            .journal
            .iter()
            .filter(|e| e.block_height >= from_height)
            .count();
        self.journal.retain(|e| e.block_height < from_height);

        self.state = snapshot.state;
        self.head = snapshot.head;
        self.events_applied = snapshot.events_applied;

        let mut replayed: usize = 0;
        let to_replay: Vec<EventEnvelope> = self
            .journal
            .iter()
            .filter(|e| e.block_height >= snapshot.height)
            .cloned()
            .collect();
        for envelope in &to_replay {
            if let Err(source) = self.state.apply(&envelope.event) {
                return Err(self.halt(IngestError::Ledger {
                    cursor: envelope.cursor(),
                    source: Box::new(source),
                }));
            }
            self.head = Some(envelope.cursor());
            self.events_applied = self.events_applied.saturating_add(1);
            replayed = replayed.saturating_add(1);
        }

        self.retractions = self.retractions.saturating_add(1);
        self.committed_at = Some(Utc::now());
        let outcome = RetractOutcome {
            from_height,
            restored_height: snapshot.height,
            retracted,
            replayed,
        };
        warn!(
            from_height,
            restored_height = outcome.restored_height,
            retracted,
            replayed,
            "retracted reorganized history"
        );
        Ok(outcome)
    }

    /// Discard everything and return to genesis, clearing a halt.
    pub fn reset(&mut self) {
        info!(
            events_applied = self.events_applied,
            "resetting ingestor to genesis"
        );
        self.state = self.genesis.clone();
        self.snapshots.clear();
        self.journal.clear();
        self.push_genesis_snapshot();
        self.head = None;
        self.events_applied = 0;
        self.retractions = 0;
        self.health = IngestHealth::Healthy;
        self.committed_at = Some(Utc::now());
    }

    /// The journaled envelope at `cursor`. The journal is cursor-ordered.
    fn journaled(&self, cursor: EventCursor) -> Option<&EventEnvelope> {
        let index = self
            .journal
            .binary_search_by(|e| e.cursor().cmp(&cursor))
            .ok()?;
        self.journal.get(index)
    }

    fn ensure_running(&self) -> Result<(), IngestError> {
        match &self.health {
            IngestHealth::Healthy => Ok(()),
            IngestHealth::Halted { reason } => Err(IngestError::Halted {
                reason: reason.clone(),
            }),
        }
    }

    fn halt(&mut self, err: IngestError) -> IngestError {
        error!(error = %err, head = ?self.head, "ingestion halted");
        self.health = IngestHealth::Halted {
            reason: err.to_string(),
        };
        err
    }

    /// Snapshot the state before the first event of a block that is at
    /// least one interval past the newest snapshot.
    fn maybe_snapshot(&mut self, block_height: u64) {
        let newest = self.snapshots.back().map_or(0, |s| s.height);
        let due = newest.saturating_add(self.settings.snapshot_interval_blocks);
        let first_in_block = self.head.is_none_or(|h| h.block_height < block_height);
        if block_height >= due && first_in_block {
            self.snapshots.push_back(Snapshot {
                height: block_height,
                head: self.head,
                events_applied: self.events_applied,
                state: self.state.clone(),
            });
            debug!(height = block_height, retained = self.snapshots.len(), "snapshot taken");
        }
    }

    /// Drop snapshots no longer needed to reach `head - max_reorg_depth`,
    /// and the journal entries only they could replay.
    fn prune(&mut self) {
        let Some(head) = self.head else {
            return;
        };
        let floor = head.block_height.saturating_sub(self.settings.max_reorg_depth);
        while self.snapshots.len() > 1 && self.snapshots.get(1).is_some_and(|s| s.height <= floor)
        {
            self.snapshots.pop_front();
        }
        let oldest = self.snapshots.front().map_or(0, |s| s.height);
        while self.journal.front().is_some_and(|e| e.block_height < oldest) {
            self.journal.pop_front();
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The current ledger state.
    pub const fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Current health.
    pub const fn health(&self) -> &IngestHealth {
        &self.health
    }

    /// Whether a fatal error has halted ingestion.
    pub const fn is_halted(&self) -> bool {
        self.health.is_halted()
    }

    /// Cursor of the last applied envelope.
    pub const fn head(&self) -> Option<EventCursor> {
        self.head
    }

    /// Lowest block height a retraction can still reach.
    pub fn oldest_retained_height(&self) -> u64 {
        self.snapshots.front().map_or(0, |s| s.height)
    }

    /// Number of retained snapshots, genesis included while retained.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Status published alongside every committed view.
    pub fn status(&self) -> IngestStatus {
        IngestStatus {
            health: self.health.clone(),
            head: self.head,
            events_applied: self.events_applied,
            retractions: self.retractions,
            committed_at: self.committed_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vault_types::{MemberId, VaultEvent};

    use super::*;

    fn addr(n: u8) -> MemberId {
        MemberId::parse(&format!("0x{n:040x}")).unwrap()
    }

    fn adjust(height: u64, member: u8, next: u128) -> EventEnvelope {
        EventEnvelope::new(
            height,
            0,
            VaultEvent::AdjustedHoldings {
                member: addr(member),
                eligible_amount: 0,
                next_epoch_amount: next,
            },
        )
    }

    fn settings(interval: u64, depth: u64) -> IngestSettings {
        IngestSettings {
            snapshot_interval_blocks: interval,
            max_reorg_depth: depth,
        }
    }

    #[test]
    fn cursor_must_advance() {
        let mut ingestor = Ingestor::new(EpochClock::default(), IngestSettings::default());
        ingestor.ingest(adjust(5, 1, 10)).unwrap();

        let dup = ingestor.ingest(adjust(5, 1, 10)).unwrap_err();
        assert!(matches!(dup, IngestError::DuplicateEvent { .. }));
        assert!(!ingestor.is_halted());

        let stale = ingestor.ingest(adjust(4, 1, 10)).unwrap_err();
        assert!(matches!(stale, IngestError::OutOfOrder { .. }));
        assert!(ingestor.is_halted());
        assert!(matches!(
            ingestor.ingest(adjust(6, 1, 10)),
            Err(IngestError::Halted { .. })
        ));
    }

    #[test]
    fn redelivered_history_is_a_duplicate() {
        let mut ingestor = Ingestor::new(EpochClock::default(), IngestSettings::default());
        ingestor.ingest(adjust(1, 1, 10)).unwrap();
        ingestor.ingest(adjust(2, 2, 20)).unwrap();
        let before = ingestor.state().clone();

        let dup = ingestor.ingest(adjust(1, 1, 10)).unwrap_err();
        assert_eq!(
            dup,
            IngestError::DuplicateEvent {
                cursor: EventCursor {
                    block_height: 1,
                    log_index: 0,
                },
            }
        );
        assert!(!ingestor.is_halted());
        assert_eq!(ingestor.state(), &before);
        assert_eq!(ingestor.status().events_applied, 2);

        ingestor.ingest(adjust(3, 1, 30)).unwrap();
        assert_eq!(ingestor.head().map(|c| c.block_height), Some(3));
    }

    #[test]
    fn conflicting_redelivery_halts() {
        let mut ingestor = Ingestor::new(EpochClock::default(), IngestSettings::default());
        ingestor.ingest(adjust(1, 1, 10)).unwrap();
        ingestor.ingest(adjust(2, 2, 20)).unwrap();

        let err = ingestor.ingest(adjust(1, 1, 99)).unwrap_err();
        assert!(matches!(err, IngestError::OutOfOrder { .. }));
        assert!(ingestor.is_halted());
    }

    #[test]
    fn gap_behind_head_is_out_of_order() {
        let mut ingestor = Ingestor::new(EpochClock::default(), IngestSettings::default());
        ingestor.ingest(adjust(1, 1, 10)).unwrap();
        ingestor.ingest(adjust(3, 1, 10)).unwrap();

        let err = ingestor.ingest(adjust(2, 1, 10)).unwrap_err();
        assert!(matches!(err, IngestError::OutOfOrder { .. }));
        assert!(ingestor.is_halted());
    }

    #[test]
    fn reset_clears_retraction_count() {
        let envelopes: Vec<EventEnvelope> = (1..=3).map(|h| adjust(h, 1, 1)).collect();
        let mut ingestor =
            Ingestor::replay(EpochClock::default(), IngestSettings::default(), &envelopes)
                .unwrap();
        ingestor.retract(2).unwrap();
        assert_eq!(ingestor.status().retractions, 1);

        ingestor.reset();
        let status = ingestor.status();
        assert_eq!(status.retractions, 0);
        assert_eq!(status.events_applied, 0);
        assert_eq!(status.head, None);
    }

    #[test]
    fn ledger_error_halts_until_reset() {
        let mut ingestor = Ingestor::new(EpochClock::default(), IngestSettings::default());
        let bad = EventEnvelope::new(
            1,
            0,
            VaultEvent::RewardPaid {
                member: addr(1),
                epoch: 1,
                claimed_amount: 1,
            },
        );
        assert!(matches!(ingestor.ingest(bad), Err(IngestError::Ledger { .. })));
        assert!(ingestor.status().is_stale());

        ingestor.reset();
        assert!(!ingestor.is_halted());
        ingestor.ingest(adjust(1, 1, 10)).unwrap();
        assert_eq!(ingestor.status().events_applied, 1);
    }

    #[test]
    fn retract_restores_prefix_state() {
        let envelopes: Vec<EventEnvelope> =
            (1..=20).map(|h| adjust(h, 1, u128::from(h))).collect();
        let clock = EpochClock::default();
        let mut ingestor = Ingestor::replay(clock, settings(4, 100), &envelopes).unwrap();
        let expected = Ingestor::replay(clock, settings(4, 100), &envelopes[..9]).unwrap();

        let outcome = ingestor.retract(10).unwrap();
        assert_eq!(outcome.retracted, 11);
        assert_eq!(outcome.restored_height, 8);
        assert_eq!(outcome.replayed, 2);
        assert_eq!(ingestor.state(), expected.state());
        assert_eq!(ingestor.head(), expected.head());
        assert_eq!(ingestor.status().retractions, 1);
        assert_eq!(ingestor.status().events_applied, 9);
    }

    #[test]
    fn retract_above_head_changes_nothing() {
        let envelopes: Vec<EventEnvelope> = (1..=3).map(|h| adjust(h, 1, 1)).collect();
        let mut ingestor =
            Ingestor::replay(EpochClock::default(), IngestSettings::default(), &envelopes)
                .unwrap();
        let before = ingestor.state().clone();
        let outcome = ingestor.retract(50).unwrap();
        assert_eq!(outcome.retracted, 0);
        assert_eq!(ingestor.state(), &before);
    }

    #[test]
    fn history_is_pruned_behind_reorg_depth() {
        let envelopes: Vec<EventEnvelope> = (1..=100).map(|h| adjust(h, 1, 1)).collect();
        let mut ingestor =
            Ingestor::replay(EpochClock::default(), settings(10, 20), &envelopes).unwrap();
        assert!(ingestor.oldest_retained_height() > 0);
        assert!(ingestor.oldest_retained_height() <= 80);
        // 80, 90 and 100 are the only snapshots still needed.
        assert_eq!(ingestor.snapshot_count(), 3);

        let err = ingestor.retract(5).unwrap_err();
        assert!(matches!(err, IngestError::ReorgBeyondHistory { from_height: 5, .. }));
        assert!(ingestor.is_halted());
    }
}
