use std::sync::Arc;

use crate::{
    checkpoint::{Checkpoint, CheckpointStore},
    error::CheckpointError,
    event::EventData,
};

/// Identifies the partition a callback is about, and checkpoints it.
///
/// One context exists per partition for the whole run. The host moves its cursor to the last event
/// of every batch before handing the batch over.
pub struct PartitionContext {
    partition_id: String,
    event_hub_name: String,
    consumer_group: String,
    owner: String,
    cursor: Option<(Option<i64>, i64)>,
    last_checkpoint: Option<Checkpoint>,
    checkpoint_store: Arc<dyn CheckpointStore>,
}

impl std::fmt::Debug for PartitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionContext")
            .field("partition_id", &self.partition_id)
            .field("event_hub_name", &self.event_hub_name)
            .field("consumer_group", &self.consumer_group)
            .field("owner", &self.owner)
            .field("cursor", &self.cursor)
            .field("last_checkpoint", &self.last_checkpoint)
            .finish_non_exhaustive()
    }
}

impl PartitionContext {
    pub(crate) fn new(
        partition_id: impl Into<String>,
        event_hub_name: impl Into<String>,
        consumer_group: impl Into<String>,
        owner: impl Into<String>,
        checkpoint_store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            event_hub_name: event_hub_name.into(),
            consumer_group: consumer_group.into(),
            owner: owner.into(),
            cursor: None,
            last_checkpoint: None,
            checkpoint_store,
        }
    }

    /// The partition being processed
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// The event hub the partition belongs to
    pub fn event_hub_name(&self) -> &str {
        &self.event_hub_name
    }

    /// The consumer group the partition is read as
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    /// The name of the host reading the partition
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The last checkpoint written through this context, or loaded when the partition was opened
    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.last_checkpoint.as_ref()
    }

    pub(crate) fn checkpoint_store(&self) -> &dyn CheckpointStore {
        self.checkpoint_store.as_ref()
    }

    pub(crate) fn set_last_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.last_checkpoint = Some(checkpoint);
    }

    pub(crate) fn move_cursor(&mut self, event: &EventData) {
        self.cursor = Some((event.offset(), event.sequence_number()));
    }

    /// Checkpoints the partition at the last event of the current batch
    pub async fn checkpoint(&mut self) -> Result<(), CheckpointError> {
        let (offset, sequence_number) = self.cursor.ok_or(CheckpointError::NothingToCheckpoint)?;
        let checkpoint = Checkpoint::new(&self.partition_id, offset, sequence_number, &self.owner);
        self.checkpoint_store
            .update_checkpoint(checkpoint.clone())
            .await?;
        self.last_checkpoint = Some(checkpoint);
        Ok(())
    }
}
