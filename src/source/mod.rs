//! Where partitions are read from

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ConnectionError, PartitionError},
    event::EventData,
    position::StartingPosition,
};

mod event_hub_source;

pub use event_hub_source::EventHubSource;

/// A partitioned stream of events
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// The partitions of the event hub
    async fn partition_ids(&self) -> Result<Vec<String>, ConnectionError>;

    /// Starts reading one partition from `position`
    async fn open_receiver(
        &self,
        partition_id: &str,
        position: StartingPosition,
    ) -> Result<EventReceiver, PartitionError>;
}

#[async_trait]
impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    async fn partition_ids(&self) -> Result<Vec<String>, ConnectionError> {
        (**self).partition_ids().await
    }

    async fn open_receiver(
        &self,
        partition_id: &str,
        position: StartingPosition,
    ) -> Result<EventReceiver, PartitionError> {
        (**self).open_receiver(partition_id, position).await
    }
}

/// What [`EventReceiver::recv`] produced
#[derive(Debug)]
pub enum Received {
    /// One or more events, in partition order
    Events(Vec<EventData>),

    /// The reader reported an error. Events may follow.
    Error(PartitionError),
}

/// The receiving end of one open partition.
///
/// Events are pushed into a bounded channel by a background task. Dropping the receiver stops
/// that task; [`EventReceiver::close`] also waits for it to finish.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: mpsc::Receiver<Result<EventData, PartitionError>>,
    pending_error: Option<PartitionError>,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventReceiver {
    /// Wraps a channel fed by someone else
    pub fn new(receiver: mpsc::Receiver<Result<EventData, PartitionError>>) -> Self {
        Self {
            receiver,
            pending_error: None,
            stop: CancellationToken::new(),
            task: None,
        }
    }

    pub(crate) fn with_task(
        receiver: mpsc::Receiver<Result<EventData, PartitionError>>,
        stop: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            receiver,
            pending_error: None,
            stop,
            task: Some(task),
        }
    }

    /// Waits for the next event, then takes every event already received up to
    /// `max_batch_size`. An error ends the batch and is returned by the following call.
    ///
    /// Returns `None` once the reader has stopped and everything it sent has been taken.
    ///
    /// Cancel safe: nothing is lost if the future is dropped before it completes.
    pub async fn recv(&mut self, max_batch_size: u32) -> Option<Received> {
        if let Some(err) = self.pending_error.take() {
            return Some(Received::Error(err));
        }

        let first = match self.receiver.recv().await? {
            Ok(event) => event,
            Err(err) => return Some(Received::Error(err)),
        };

        let max_batch_size = max_batch_size.max(1) as usize;
        let mut events = Vec::with_capacity(max_batch_size.min(64));
        events.push(first);
        while events.len() < max_batch_size {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => events.push(event),
                Ok(Err(err)) => {
                    self.pending_error = Some(err);
                    break;
                }
                Err(_) => break,
            }
        }
        Some(Received::Events(events))
    }

    /// Stops the reader and waits until it has released its connection
    pub async fn close(mut self) {
        self.stop.cancel();
        self.receiver.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::error!("Partition reader task failed: {}", err);
            }
        }
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    //! An in-memory [`EventSource`]

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    pub(crate) type EventSender = mpsc::Sender<Result<EventData, PartitionError>>;

    #[derive(Debug, Default)]
    pub(crate) struct FakeSource {
        partitions: Vec<String>,
        unreachable: bool,
        stalled: bool,
        readers: Mutex<HashMap<String, VecDeque<mpsc::Receiver<Result<EventData, PartitionError>>>>>,
        idle: Mutex<Vec<EventSender>>,
        opened: Mutex<Vec<(String, StartingPosition)>>,
    }

    impl FakeSource {
        pub(crate) fn new(partitions: &[&str]) -> Self {
            Self {
                partitions: partitions.iter().map(ToString::to_string).collect(),
                ..Default::default()
            }
        }

        pub(crate) fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Default::default()
            }
        }

        /// A source whose partitions never finish opening
        pub(crate) fn stalled(partitions: &[&str]) -> Self {
            Self {
                stalled: true,
                ..Self::new(partitions)
            }
        }

        /// Queues a reader for the next open of `partition_id` and returns its feeding end
        pub(crate) fn reader(&self, partition_id: &str) -> EventSender {
            let (sender, receiver) = mpsc::channel(64);
            self.readers
                .lock()
                .unwrap()
                .entry(partition_id.to_string())
                .or_default()
                .push_back(receiver);
            sender
        }

        pub(crate) fn opened(&self) -> Vec<(String, StartingPosition)> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn partition_ids(&self) -> Result<Vec<String>, ConnectionError> {
            if self.unreachable {
                return Err(ConnectionError::new(
                    "failed to reach event hub",
                    azure_core::Error::message(azure_core::error::ErrorKind::Io, "no route to host"),
                ));
            }
            Ok(self.partitions.clone())
        }

        async fn open_receiver(
            &self,
            partition_id: &str,
            position: StartingPosition,
        ) -> Result<EventReceiver, PartitionError> {
            self.opened
                .lock()
                .unwrap()
                .push((partition_id.to_string(), position));
            if self.stalled {
                std::future::pending::<()>().await;
            }
            let queued = self
                .readers
                .lock()
                .unwrap()
                .get_mut(partition_id)
                .and_then(VecDeque::pop_front);
            let receiver = match queued {
                Some(receiver) => receiver,
                None => {
                    // Nothing queued: a partition that stays quiet
                    let (sender, receiver) = mpsc::channel(1);
                    self.idle.lock().unwrap().push(sender);
                    receiver
                }
            };
            Ok(EventReceiver::new(receiver))
        }
    }

    #[tokio::test]
    async fn recv_batches_what_is_ready() {
        let (sender, receiver) = mpsc::channel(16);
        let mut receiver = EventReceiver::new(receiver);
        for sequence_number in 0..5 {
            sender
                .send(Ok(EventData::new("x", sequence_number, None)))
                .await
                .unwrap();
        }

        let Some(Received::Events(first)) = receiver.recv(3).await else {
            panic!("expected events")
        };
        let Some(Received::Events(second)) = receiver.recv(3).await else {
            panic!("expected events")
        };
        let sequence_numbers: Vec<_> = first
            .iter()
            .chain(second.iter())
            .map(EventData::sequence_number)
            .collect();
        assert_eq!(first.len(), 3);
        assert_eq!(sequence_numbers, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn error_ends_batch_and_is_returned_next() {
        let (sender, receiver) = mpsc::channel(16);
        let mut receiver = EventReceiver::new(receiver);
        sender.send(Ok(EventData::new("a", 1, None))).await.unwrap();
        sender
            .send(Err(PartitionError::InvalidBody("not data".into())))
            .await
            .unwrap();
        sender.send(Ok(EventData::new("b", 2, None))).await.unwrap();
        drop(sender);

        assert!(matches!(receiver.recv(10).await, Some(Received::Events(events)) if events.len() == 1));
        assert!(matches!(receiver.recv(10).await, Some(Received::Error(PartitionError::InvalidBody(_)))));
        assert!(matches!(receiver.recv(10).await, Some(Received::Events(events)) if events[0].sequence_number() == 2));
        assert!(receiver.recv(10).await.is_none());
    }

    #[tokio::test]
    async fn close_stops_the_reader_task() {
        let (sender, receiver) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let task_stop = stop.clone();
        let task = tokio::spawn(async move {
            task_stop.cancelled().await;
            drop(sender);
        });
        let receiver = EventReceiver::with_task(receiver, stop.clone(), task);
        receiver.close().await;
        assert!(stop.is_cancelled());
    }
}
