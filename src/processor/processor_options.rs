use std::time::Duration;

use crate::position::InitialPosition;

/// The set of options that can be specified when creating an
/// [`crate::processor::EventProcessorHost`] to configure its behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessorOptions {
    /// The largest number of events delivered to [`crate::processor::EventProcessor::on_events`]
    /// at once. Never 0.
    pub max_batch_size: u32,

    /// Where a partition starts reading the first time it is opened during a run
    pub initial_position: InitialPosition,

    /// How long to wait before reopening a partition whose reader stopped. Up to a quarter of
    /// this is added at random so that partitions do not reconnect in lock step.
    pub partition_retry_delay: Duration,
}

impl ProcessorOptions {
    /// Default for [`ProcessorOptions::max_batch_size`]
    pub const DEFAULT_MAX_BATCH_SIZE: u32 = 10;

    /// Default for [`ProcessorOptions::partition_retry_delay`]
    pub const DEFAULT_PARTITION_RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Create a new instance of [`ProcessorOptions`] with default values
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets [`ProcessorOptions::max_batch_size`]. 0 is treated as 1.
    pub fn with_max_batch_size(mut self, max_batch_size: u32) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Sets [`ProcessorOptions::initial_position`]
    pub fn with_initial_position(mut self, initial_position: InitialPosition) -> Self {
        self.initial_position = initial_position;
        self
    }

    /// Sets [`ProcessorOptions::partition_retry_delay`]
    pub fn with_partition_retry_delay(mut self, delay: Duration) -> Self {
        self.partition_retry_delay = delay;
        self
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            initial_position: InitialPosition::default(),
            partition_retry_delay: Self::DEFAULT_PARTITION_RETRY_DELAY,
        }
    }
}
