use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    checkpoint::CheckpointStore,
    error::{Error, HostError},
    source::EventSource,
};

use super::{
    partition_pump::PartitionPump, EventProcessorFactory, PartitionContext, ProcessorOptions,
};

/// Observable lifecycle of an [`EventProcessorHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// No processor registered
    Stopped,
    /// Listing partitions and starting pumps
    Starting,
    /// Pumps are running
    Running,
    /// Waiting for pumps to drain
    Stopping,
}

#[derive(Debug)]
enum State {
    Stopped,
    Starting,
    Running {
        stop: CancellationToken,
        pumps: Vec<(String, JoinHandle<()>)>,
    },
    Stopping,
}

/// Reads every partition of one event hub as one consumer group and delivers the events to
/// processors created by a registered [`EventProcessorFactory`].
///
/// ```rust,no_run
/// # async fn example(config: eventhub_dumper::Config) -> Result<(), eventhub_dumper::Error> {
/// use std::sync::Arc;
/// use eventhub_dumper::{
///     checkpoint::BlobCheckpointStore, dumper::Dumper, output::Stdout,
///     processor::{EventProcessorHost, PartitionContext}, source::EventHubSource,
/// };
///
/// let store = BlobCheckpointStore::connect(
///     &config.storage_connection_string,
///     &config.storage_container_name,
///     &config.event_hub_name,
///     config.consumer_group(),
/// )
/// .await?;
/// let mut host = EventProcessorHost::new(
///     &config.event_hub_name,
///     config.consumer_group(),
///     EventHubSource::from_config(&config),
///     Arc::new(store),
///     config.processor_options.clone(),
/// );
///
/// host.register_event_processor(|_: &PartitionContext| Dumper::new(Arc::new(Stdout)))
///     .await?;
/// // ...
/// host.unregister_event_processor().await?;
/// # Ok(())
/// # }
/// ```
pub struct EventProcessorHost<S> {
    host_name: String,
    event_hub_name: String,
    consumer_group: String,
    source: Arc<S>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    options: ProcessorOptions,
    state: State,
}

impl<S> std::fmt::Debug for EventProcessorHost<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessorHost")
            .field("host_name", &self.host_name)
            .field("event_hub_name", &self.event_hub_name)
            .field("consumer_group", &self.consumer_group)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S> EventProcessorHost<S>
where
    S: EventSource,
{
    /// Creates a stopped host with a random host name
    pub fn new(
        event_hub_name: impl Into<String>,
        consumer_group: impl Into<String>,
        source: S,
        checkpoint_store: Arc<dyn CheckpointStore>,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            host_name: format!("host-{}", uuid::Uuid::new_v4()),
            event_hub_name: event_hub_name.into(),
            consumer_group: consumer_group.into(),
            source: Arc::new(source),
            checkpoint_store,
            options,
            state: State::Stopped,
        }
    }

    /// Replaces the generated host name, which is recorded as the owner of every checkpoint
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// The name recorded as owner of checkpoints written by this host
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Where the host is in its lifecycle
    pub fn state(&self) -> HostState {
        match self.state {
            State::Stopped => HostState::Stopped,
            State::Starting => HostState::Starting,
            State::Running { .. } => HostState::Running,
            State::Stopping => HostState::Stopping,
        }
    }

    /// Partitions being pumped, in the order the event hub listed them
    pub fn partition_ids(&self) -> Vec<&str> {
        match &self.state {
            State::Running { pumps, .. } => pumps.iter().map(|(id, _)| id.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Lists the partitions and starts one pump per partition, each with its own processor.
    ///
    /// Fails if a processor is already registered or if the event hub cannot be reached, in which
    /// case the host stays stopped.
    pub async fn register_event_processor<F>(&mut self, factory: F) -> Result<(), Error>
    where
        F: EventProcessorFactory,
    {
        if !matches!(self.state, State::Stopped) {
            return Err(HostError::AlreadyRegistered.into());
        }
        self.state = State::Starting;
        log::debug!(
            "Host {} starting on {}/{}",
            self.host_name,
            self.event_hub_name,
            self.consumer_group
        );

        let partition_ids = match self.source.partition_ids().await {
            Ok(partition_ids) => partition_ids,
            Err(err) => {
                self.state = State::Stopped;
                return Err(err.into());
            }
        };

        let stop = CancellationToken::new();
        let pumps = partition_ids
            .into_iter()
            .map(|partition_id| {
                let context = PartitionContext::new(
                    partition_id.clone(),
                    &self.event_hub_name,
                    &self.consumer_group,
                    &self.host_name,
                    self.checkpoint_store.clone(),
                );
                let processor = factory.create_processor(&context);
                let pump = PartitionPump::new(
                    self.source.clone(),
                    processor,
                    context,
                    self.options.clone(),
                    stop.child_token(),
                );
                (partition_id, tokio::spawn(pump.run()))
            })
            .collect::<Vec<_>>();

        log::info!(
            "Host {} pumping {} partition(s) of {}",
            self.host_name,
            pumps.len(),
            self.event_hub_name
        );
        self.state = State::Running { stop, pumps };
        Ok(())
    }

    /// Stops every pump and waits until each has closed its partition. Batches being processed
    /// are completed first.
    pub async fn unregister_event_processor(&mut self) -> Result<(), HostError> {
        let (stop, pumps) = match std::mem::replace(&mut self.state, State::Stopping) {
            State::Running { stop, pumps } => (stop, pumps),
            other => {
                let _ = std::mem::replace(&mut self.state, other);
                return Err(HostError::NotRegistered);
            }
        };

        log::debug!("Host {} stopping", self.host_name);
        stop.cancel();
        for (partition_id, pump) in pumps {
            if let Err(err) = pump.await {
                log::error!("Pump of partition {} failed: {}", partition_id, err);
            }
        }

        self.state = State::Stopped;
        log::info!("Host {} stopped", self.host_name);
        Ok(())
    }
}
