//! A processor host that reads every partition of an event hub and hands batches to an
//! [`EventProcessor`].
//!
//! The host does not negotiate partition ownership with other hosts. Run one host per consumer
//! group, or give each host its own consumer group.

use async_trait::async_trait;

use crate::{error::PartitionError, event::EventData};

mod event_processor_host;
mod partition_context;
mod partition_pump;
mod processor_options;

pub use event_processor_host::{EventProcessorHost, HostState};
pub use partition_context::PartitionContext;
pub use processor_options::ProcessorOptions;

/// Why a partition stopped being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The host is being unregistered
    Shutdown,

    /// The reader lost the partition: the link was detached, another reader took over, or the
    /// partition could not be read. The host reopens it after a delay.
    LeaseLost,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Shutdown => write!(f, "Shutdown"),
            CloseReason::LeaseLost => write!(f, "LeaseLost"),
        }
    }
}

/// Callbacks invoked by the host for one partition.
///
/// Calls for one partition never overlap and batches arrive in partition order. Calls for
/// different partitions run concurrently on separate instances.
#[async_trait]
pub trait EventProcessor: Send {
    /// The partition is about to be read. An error is reported through
    /// [`EventProcessor::on_error`] and the partition is retried later.
    async fn on_open(&mut self, context: &PartitionContext) -> Result<(), PartitionError>;

    /// The partition stopped being read
    async fn on_close(&mut self, context: &PartitionContext, reason: CloseReason);

    /// Reading the partition failed. The host keeps going.
    async fn on_error(&mut self, context: &PartitionContext, error: &PartitionError);

    /// A batch of events in partition order. `context` is positioned at the last event, so
    /// [`PartitionContext::checkpoint`] marks the whole batch as processed.
    async fn on_events(
        &mut self,
        context: &mut PartitionContext,
        events: Vec<EventData>,
    ) -> Result<(), PartitionError>;
}

/// Creates one [`EventProcessor`] per partition.
///
/// Implemented for closures `Fn(&PartitionContext) -> P`.
pub trait EventProcessorFactory: Send + Sync + 'static {
    /// The processor type
    type Processor: EventProcessor + 'static;

    /// Creates the processor for the partition described by `context`
    fn create_processor(&self, context: &PartitionContext) -> Self::Processor;
}

impl<F, P> EventProcessorFactory for F
where
    F: Fn(&PartitionContext) -> P + Send + Sync + 'static,
    P: EventProcessor + 'static,
{
    type Processor = P;

    fn create_processor(&self, context: &PartitionContext) -> P {
        (self)(context)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    //! Fakes shared by the processor tests

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    /// What a [`RecordingProcessor`] saw, in order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Open(String),
        Close(String, CloseReason),
        Error(String, String),
        Events(String, Vec<i64>),
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    /// Records every call and checkpoints each batch
    pub(crate) struct RecordingProcessor {
        pub(crate) recorder: Recorder,
        pub(crate) fail_open: bool,
        pub(crate) batch_delay: Option<std::time::Duration>,
    }

    impl RecordingProcessor {
        pub(crate) fn new(recorder: Recorder) -> Self {
            Self {
                recorder,
                fail_open: false,
                batch_delay: None,
            }
        }
    }

    #[async_trait]
    impl EventProcessor for RecordingProcessor {
        async fn on_open(&mut self, context: &PartitionContext) -> Result<(), PartitionError> {
            if self.fail_open {
                self.fail_open = false;
                return Err(PartitionError::Processor("refusing to open".to_string()));
            }
            self.recorder
                .push(Call::Open(context.partition_id().to_string()));
            Ok(())
        }

        async fn on_close(&mut self, context: &PartitionContext, reason: CloseReason) {
            self.recorder
                .push(Call::Close(context.partition_id().to_string(), reason));
        }

        async fn on_error(&mut self, context: &PartitionContext, error: &PartitionError) {
            self.recorder.push(Call::Error(
                context.partition_id().to_string(),
                error.to_string(),
            ));
        }

        async fn on_events(
            &mut self,
            context: &mut PartitionContext,
            events: Vec<EventData>,
        ) -> Result<(), PartitionError> {
            if let Some(delay) = self.batch_delay {
                tokio::time::sleep(delay).await;
            }
            self.recorder.push(Call::Events(
                context.partition_id().to_string(),
                events.iter().map(EventData::sequence_number).collect(),
            ));
            context
                .checkpoint()
                .await
                .map_err(|err| PartitionError::Processor(err.to_string()))
        }
    }
}
