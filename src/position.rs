//! Where a partition starts reading

use azeventhubs::consumer::EventPosition;
use time::OffsetDateTime;

use crate::checkpoint::Checkpoint;

/// Policy for choosing the first event read from a partition when it is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum InitialPosition {
    /// Only events enqueued after the partition is opened. Stored checkpoints are ignored.
    #[default]
    Now,

    /// The oldest event still retained by the event hub
    Earliest,

    /// Right after the stored checkpoint, or [`InitialPosition::Now`] when there is none
    Checkpoint,
}

impl InitialPosition {
    /// Whether stored checkpoints are consulted when opening a partition
    pub fn uses_stored_checkpoint(&self) -> bool {
        matches!(self, InitialPosition::Checkpoint)
    }

    /// Resolves the policy into a concrete position for a partition opened at `now`
    pub fn resolve(&self, stored: Option<&Checkpoint>, now: OffsetDateTime) -> StartingPosition {
        match (self, stored) {
            (InitialPosition::Earliest, _) => StartingPosition::Earliest,
            (InitialPosition::Checkpoint, Some(checkpoint)) => StartingPosition::after(checkpoint),
            (InitialPosition::Checkpoint, None) | (InitialPosition::Now, _) => {
                StartingPosition::EnqueuedTime(now)
            }
        }
    }
}

impl std::fmt::Display for InitialPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitialPosition::Now => write!(f, "now"),
            InitialPosition::Earliest => write!(f, "earliest"),
            InitialPosition::Checkpoint => write!(f, "checkpoint"),
        }
    }
}

/// A concrete position in a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartingPosition {
    /// The oldest retained event
    Earliest,

    /// The first event enqueued at or after the given time
    EnqueuedTime(OffsetDateTime),

    /// The event after the one at this offset
    AfterOffset(i64),

    /// The event after the one with this sequence number
    AfterSequenceNumber(i64),
}

impl StartingPosition {
    /// The position right after a checkpoint. The offset is preferred when it is known.
    pub fn after(checkpoint: &Checkpoint) -> Self {
        match checkpoint.offset {
            Some(offset) => StartingPosition::AfterOffset(offset),
            None => StartingPosition::AfterSequenceNumber(checkpoint.sequence_number),
        }
    }
}

impl From<StartingPosition> for EventPosition {
    fn from(position: StartingPosition) -> Self {
        match position {
            StartingPosition::Earliest => EventPosition::earliest(),
            StartingPosition::EnqueuedTime(time) => EventPosition::from_enqueued_time(time),
            StartingPosition::AfterOffset(offset) => EventPosition::from_offset(offset, false),
            StartingPosition::AfterSequenceNumber(sequence_number) => {
                EventPosition::from_sequence_number(sequence_number, false)
            }
        }
    }
}

impl std::fmt::Display for StartingPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartingPosition::Earliest => write!(f, "earliest"),
            StartingPosition::EnqueuedTime(time) => write!(f, "enqueued at or after {}", time),
            StartingPosition::AfterOffset(offset) => write!(f, "after offset {}", offset),
            StartingPosition::AfterSequenceNumber(sequence_number) => {
                write!(f, "after sequence number {}", sequence_number)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn checkpoint(offset: Option<i64>, sequence_number: i64) -> Checkpoint {
        Checkpoint::new("0", offset, sequence_number, "host")
    }

    #[test]
    fn now_ignores_stored_checkpoint() {
        let now = datetime!(2024-01-02 03:04:05 UTC);
        let stored = checkpoint(Some(100), 10);
        assert_eq!(
            InitialPosition::Now.resolve(Some(&stored), now),
            StartingPosition::EnqueuedTime(now)
        );
        assert!(!InitialPosition::Now.uses_stored_checkpoint());
    }

    #[test]
    fn earliest_always_starts_from_the_beginning() {
        let now = datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(
            InitialPosition::Earliest.resolve(Some(&checkpoint(Some(1), 1)), now),
            StartingPosition::Earliest
        );
    }

    #[test]
    fn checkpoint_resumes_after_offset_or_falls_back_to_now() {
        let now = datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(
            InitialPosition::Checkpoint.resolve(Some(&checkpoint(Some(4096), 42)), now),
            StartingPosition::AfterOffset(4096)
        );
        assert_eq!(
            InitialPosition::Checkpoint.resolve(Some(&checkpoint(None, 42)), now),
            StartingPosition::AfterSequenceNumber(42)
        );
        assert_eq!(
            InitialPosition::Checkpoint.resolve(None, now),
            StartingPosition::EnqueuedTime(now)
        );
    }
}
