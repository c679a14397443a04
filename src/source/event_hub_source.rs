use async_trait::async_trait;
use azeventhubs::{
    consumer::{EventHubConsumerClient, EventHubConsumerClientOptions, EventPosition, ReadEventOptions},
    BasicRetryPolicy,
};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{ConnectionError, PartitionError},
    event::EventData,
    position::StartingPosition,
};

use super::{EventReceiver, EventSource};

type ConsumerClient = EventHubConsumerClient<BasicRetryPolicy>;
type EventSender = mpsc::Sender<Result<EventData, PartitionError>>;

/// Events buffered per partition before the reader waits for the processor
const DEFAULT_BUFFER_SIZE: usize = 300;

/// Reads partitions of an Azure Event Hub with [`EventHubConsumerClient`].
///
/// Each open partition gets its own client, and so its own AMQP connection, so that a slow or
/// failing partition does not hold up the others.
#[derive(Debug, Clone)]
pub struct EventHubSource {
    connection_string: String,
    event_hub_name: String,
    consumer_group: String,
    client_options: EventHubConsumerClientOptions,
    buffer_size: usize,
}

impl EventHubSource {
    /// Creates a source. Nothing is connected until partitions are listed or opened.
    pub fn new(
        connection_string: impl Into<String>,
        event_hub_name: impl Into<String>,
        consumer_group: impl Into<String>,
        client_options: EventHubConsumerClientOptions,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            event_hub_name: event_hub_name.into(),
            consumer_group: consumer_group.into(),
            client_options,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Creates a source for the event hub and consumer group of `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.event_hub_connection_string.clone(),
            config.event_hub_name.clone(),
            config.consumer_group(),
            config.client_options(),
        )
    }

    async fn connect(&self) -> Result<ConsumerClient, azure_core::Error> {
        EventHubConsumerClient::new_from_connection_string(
            self.consumer_group.clone(),
            self.connection_string.clone(),
            self.event_hub_name.clone(),
            self.client_options.clone(),
        )
        .await
    }
}

#[async_trait]
impl EventSource for EventHubSource {
    async fn partition_ids(&self) -> Result<Vec<String>, ConnectionError> {
        let mut client = self.connect().await.map_err(|err| {
            ConnectionError::new(
                format!("failed to connect to event hub '{}'", self.event_hub_name),
                err,
            )
        })?;
        let partition_ids = client.get_partition_ids().await;
        if let Err(err) = client.close().await {
            log::error!("Found error closing consumer client: {:?}", err);
        }

        partition_ids.map_err(|err| {
            ConnectionError::new(
                format!("failed to list partitions of '{}'", self.event_hub_name),
                err,
            )
        })
    }

    async fn open_receiver(
        &self,
        partition_id: &str,
        position: StartingPosition,
    ) -> Result<EventReceiver, PartitionError> {
        let client = self.connect().await.map_err(PartitionError::Open)?;

        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let (opened_tx, opened_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let task = tokio::spawn(run_reader(
            client,
            partition_id.to_string(),
            position.into(),
            opened_tx,
            sender,
            stop.clone(),
        ));
        // From here on dropping `receiver` stops the task
        let receiver = EventReceiver::with_task(receiver, stop, task);

        match opened_rx.await {
            Ok(Ok(())) => Ok(receiver),
            Ok(Err(err)) => {
                receiver.close().await;
                Err(PartitionError::Open(err))
            }
            Err(_) => {
                receiver.close().await;
                Err(PartitionError::Processor(format!(
                    "reader of partition {} stopped before opening",
                    partition_id
                )))
            }
        }
    }
}

async fn run_reader(
    mut client: ConsumerClient,
    partition_id: String,
    position: EventPosition,
    opened: oneshot::Sender<Result<(), azure_core::Error>>,
    sender: EventSender,
    stop: CancellationToken,
) {
    forward_events(&mut client, &partition_id, position, opened, sender, stop).await;

    if let Err(err) = client.close().await {
        log::error!(
            "Found error closing consumer client of partition {}: {:?}",
            partition_id,
            err
        );
    }
    log::debug!("Reader of partition {} stopped", partition_id);
}

async fn forward_events(
    client: &mut ConsumerClient,
    partition_id: &str,
    position: EventPosition,
    opened: oneshot::Sender<Result<(), azure_core::Error>>,
    sender: EventSender,
    stop: CancellationToken,
) {
    let opening =
        client.read_events_from_partition(partition_id, position, ReadEventOptions::default());
    let mut stream = tokio::select! {
        _ = stop.cancelled() => return,
        result = opening => match result {
            Ok(stream) => stream,
            Err(err) => {
                let _ = opened.send(Err(err));
                return;
            }
        },
    };
    let _ = opened.send(Ok(()));
    log::debug!("Reading partition {}", partition_id);

    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => break,
            next = stream.next() => next,
        };
        let item = match next {
            Some(Ok(event)) => EventData::try_from(event),
            Some(Err(err)) => Err(PartitionError::Receive(err)),
            None => {
                log::info!("Event stream of partition {} ended", partition_id);
                break;
            }
        };
        if sender.send(item).await.is_err() {
            break;
        }
    }

    if let Err(err) = stream.close().await {
        log::error!(
            "Found error closing event stream of partition {}: {:?}",
            partition_id,
            err
        );
    }
}
