//! Checkpoints and where they are stored

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CheckpointError;

mod blob_checkpoint_store;

pub use blob_checkpoint_store::BlobCheckpointStore;

/// A persisted marker meaning "events up to here have been processed"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// The partition this checkpoint belongs to
    pub partition_id: String,

    /// Offset of the last processed event, when the service reported one
    pub offset: Option<i64>,

    /// Sequence number of the last processed event
    pub sequence_number: i64,

    /// The host that wrote the checkpoint
    pub owner: String,

    /// Unix timestamp, in seconds, of the write
    pub updated_at: i64,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time
    pub fn new(
        partition_id: impl Into<String>,
        offset: Option<i64>,
        sequence_number: i64,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            offset,
            sequence_number,
            owner: owner.into(),
            updated_at: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }
}

/// Storage for per-partition checkpoints.
///
/// Implementations are shared by every partition pump and must not assume calls for different
/// partitions are serialized.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint of a partition, `None` if it was never checkpointed
    async fn load_checkpoint(&self, partition_id: &str)
        -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replaces the checkpoint of `checkpoint.partition_id`
    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;
}
