use std::time::Duration;

use rand::Rng;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
    error::PartitionError,
    position::StartingPosition,
    source::{EventReceiver, EventSource, Received},
};

use super::{CloseReason, EventProcessor, PartitionContext, ProcessorOptions};

/// Drives one partition: open, deliver batches, close, and reopen after the reader is lost
pub(crate) struct PartitionPump<S, P> {
    source: S,
    processor: P,
    context: PartitionContext,
    options: ProcessorOptions,
    stop: CancellationToken,
}

impl<S, P> PartitionPump<S, P>
where
    S: EventSource,
    P: EventProcessor,
{
    pub(crate) fn new(
        source: S,
        processor: P,
        context: PartitionContext,
        options: ProcessorOptions,
        stop: CancellationToken,
    ) -> Self {
        Self {
            source,
            processor,
            context,
            options,
            stop,
        }
    }

    /// Runs until the stop token is cancelled. Batches being processed when that happens are
    /// finished first.
    pub(crate) async fn run(mut self) {
        let partition_id = self.context.partition_id().to_string();
        let stop = self.stop.clone();
        let mut first_open = true;

        while !stop.is_cancelled() {
            // Loading a checkpoint and opening a reader may wait on the network; stop wins
            let position = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                position = self.starting_position(first_open) => position,
            };
            let position = match position {
                Ok(position) => position,
                Err(err) => {
                    self.report_error(&err).await;
                    if self.wait_before_retry().await {
                        continue;
                    }
                    break;
                }
            };
            first_open = false;

            log::debug!("Opening partition {} {}", partition_id, position);
            let opened = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                opened = self.source.open_receiver(&partition_id, position) => opened,
            };
            let mut receiver = match opened {
                Ok(receiver) => receiver,
                Err(err) => {
                    self.report_error(&err).await;
                    if self.wait_before_retry().await {
                        continue;
                    }
                    break;
                }
            };

            if let Err(err) = self.processor.on_open(&self.context).await {
                receiver.close().await;
                self.report_error(&err).await;
                if self.wait_before_retry().await {
                    continue;
                }
                break;
            }

            let reason = self.pump(&mut receiver).await;
            receiver.close().await;
            log::debug!("Closing partition {}: {}", partition_id, reason);
            self.processor.on_close(&self.context, reason).await;

            if reason == CloseReason::Shutdown || !self.wait_before_retry().await {
                break;
            }
        }
        log::debug!("Pump of partition {} stopped", partition_id);
    }

    /// Where to open the partition. A partition reopened during the run continues after the last
    /// checkpoint written by this host when there is one.
    async fn starting_position(&mut self, first_open: bool) -> Result<StartingPosition, PartitionError> {
        let now = OffsetDateTime::now_utc();
        if !first_open {
            if let Some(checkpoint) = self.context.last_checkpoint() {
                return Ok(StartingPosition::after(checkpoint));
            }
        }

        let initial_position = self.options.initial_position;
        if !initial_position.uses_stored_checkpoint() {
            return Ok(initial_position.resolve(None, now));
        }

        let stored = self
            .context
            .checkpoint_store()
            .load_checkpoint(self.context.partition_id())
            .await
            .map_err(PartitionError::Checkpoint)?;
        let position = initial_position.resolve(stored.as_ref(), now);
        if let Some(checkpoint) = stored {
            log::info!(
                "Partition {} resumes after sequence number {}",
                checkpoint.partition_id,
                checkpoint.sequence_number
            );
            self.context.set_last_checkpoint(checkpoint);
        }
        Ok(position)
    }

    async fn pump(&mut self, receiver: &mut EventReceiver) -> CloseReason {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return CloseReason::Shutdown,
                received = receiver.recv(self.options.max_batch_size) => received,
            };

            match received {
                Some(Received::Events(events)) => {
                    if let Some(last) = events.last() {
                        self.context.move_cursor(last);
                    }
                    if let Err(err) = self.processor.on_events(&mut self.context, events).await {
                        self.report_error(&err).await;
                    }
                }
                Some(Received::Error(err)) => self.report_error(&err).await,
                None => return CloseReason::LeaseLost,
            }
        }
    }

    async fn report_error(&mut self, err: &PartitionError) {
        log::error!("Partition {}: {}", self.context.partition_id(), err);
        self.processor.on_error(&self.context, err).await;
    }

    /// Sleeps for the retry delay. Returns `false` if stopped meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        let delay = jittered(self.options.partition_retry_delay);
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 4;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}
