//! An [`EventProcessor`] that prints what happens on each partition

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::PartitionError,
    event::{EventData, EventDataExt},
    output::Output,
    processor::{CloseReason, EventProcessor, PartitionContext},
};

/// Prints partition lifecycle and every message body as text, then checkpoints each batch
pub struct Dumper {
    output: Arc<dyn Output>,
}

impl std::fmt::Debug for Dumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumper").finish_non_exhaustive()
    }
}

impl Dumper {
    /// Creates a dumper writing to `output`
    pub fn new(output: Arc<dyn Output>) -> Self {
        Self { output }
    }
}

#[async_trait]
impl EventProcessor for Dumper {
    async fn on_open(&mut self, context: &PartitionContext) -> Result<(), PartitionError> {
        self.output.write_line(&format!(
            "Processor initialized. Partition: '{}'",
            context.partition_id()
        ));
        Ok(())
    }

    async fn on_close(&mut self, context: &PartitionContext, reason: CloseReason) {
        self.output.write_line(&format!(
            "Processor shutting down. Partition: '{}', Reason: '{}'.",
            context.partition_id(),
            reason
        ));
    }

    async fn on_error(&mut self, context: &PartitionContext, error: &PartitionError) {
        self.output.write_line(&format!(
            "Error on Partition: {}, Error: {}",
            context.partition_id(),
            error
        ));
    }

    async fn on_events(
        &mut self,
        context: &mut PartitionContext,
        events: Vec<EventData>,
    ) -> Result<(), PartitionError> {
        for event in &events {
            self.output.write_line(&format!(
                "Message received. Partition: '{}', Data: '{}'",
                context.partition_id(),
                event.body_as_text()
            ));
        }

        // A failed checkpoint is superseded by the next one
        if let Err(err) = context.checkpoint().await {
            log::error!(
                "Checkpoint of partition {} failed: {}",
                context.partition_id(),
                err
            );
            self.output.write_line(&format!(
                "Checkpoint failed. Partition: '{}', Error: {}",
                context.partition_id(),
                err
            ));
        }
        Ok(())
    }
}
