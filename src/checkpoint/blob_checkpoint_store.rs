use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::{BlobServiceClient, ContainerClient};

use crate::error::{CheckpointError, ConnectionError};

use super::{Checkpoint, CheckpointStore};

const CHECKPOINT_CONTENT_TYPE: &str = "application/json";

/// Keeps one JSON blob per partition in an Azure Storage container.
///
/// Blobs are named `{event_hub}/{consumer_group}/checkpoint/{partition_id}` so that several hubs
/// and consumer groups can share a container.
#[derive(Debug, Clone)]
pub struct BlobCheckpointStore {
    container_client: ContainerClient,
    prefix: String,
}

impl BlobCheckpointStore {
    /// Connects to the container, creating it when it does not exist yet
    pub async fn connect(
        storage_connection_string: &str,
        container_name: &str,
        event_hub_name: &str,
        consumer_group: &str,
    ) -> Result<Self, ConnectionError> {
        let connection_string = ConnectionString::new(storage_connection_string)
            .map_err(|err| ConnectionError::new("invalid storage connection string", err))?;
        let account_name = connection_string.account_name.ok_or_else(|| {
            ConnectionError::new(
                "invalid storage connection string",
                azure_core::Error::message(ErrorKind::Credential, "missing 'AccountName'"),
            )
        })?;
        let credentials = connection_string
            .storage_credentials()
            .map_err(|err| ConnectionError::new("invalid storage credentials", err))?;

        let container_client =
            BlobServiceClient::new(account_name, credentials).container_client(container_name);

        let exists = container_client.exists().await.map_err(|err| {
            ConnectionError::new(
                format!(
                    "failed to reach container '{}' in account '{}'",
                    container_name, account_name
                ),
                err,
            )
        })?;
        if !exists {
            log::info!("Creating checkpoint container {}", container_name);
            container_client.create().await.map_err(|err| {
                ConnectionError::new(
                    format!("failed to create container '{}'", container_name),
                    err,
                )
            })?;
        }

        Ok(Self::new(container_client, event_hub_name, consumer_group))
    }

    /// Wraps an existing container client
    pub fn new(container_client: ContainerClient, event_hub_name: &str, consumer_group: &str) -> Self {
        Self {
            container_client,
            prefix: checkpoint_prefix(event_hub_name, consumer_group),
        }
    }

    fn blob_name(&self, partition_id: &str) -> String {
        format!("{}{}", self.prefix, partition_id)
    }
}

fn checkpoint_prefix(event_hub_name: &str, consumer_group: &str) -> String {
    format!(
        "{}/{}/checkpoint/",
        event_hub_name.to_ascii_lowercase(),
        consumer_group.to_ascii_lowercase()
    )
}

#[async_trait]
impl CheckpointStore for BlobCheckpointStore {
    async fn load_checkpoint(
        &self,
        partition_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let blob_client = self.container_client.blob_client(self.blob_name(partition_id));
        if !blob_client.exists().await? {
            return Ok(None);
        }

        let content = blob_client.get_content().await?;
        let checkpoint = serde_json::from_slice(&content)?;
        Ok(Some(checkpoint))
    }

    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let blob_name = self.blob_name(&checkpoint.partition_id);
        let content = serde_json::to_vec(&checkpoint)?;

        self.container_client
            .blob_client(&blob_name)
            .put_block_blob(content)
            .content_type(CHECKPOINT_CONTENT_TYPE)
            .await?;

        log::debug!(
            "Checkpointed partition {} at sequence number {}",
            checkpoint.partition_id,
            checkpoint.sequence_number
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_scoped_by_hub_and_consumer_group() {
        assert_eq!(
            checkpoint_prefix("Telemetry", "$Default"),
            "telemetry/$default/checkpoint/"
        );
    }

    #[tokio::test]
    async fn malformed_connection_string_fails_before_connecting() {
        let err = BlobCheckpointStore::connect(
            "AccountName=checkpoints;Color=blue",
            "dumper",
            "telemetry",
            "$Default",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("invalid storage connection string"));

        let err = BlobCheckpointStore::connect("AccountName=checkpoints", "dumper", "telemetry", "$Default")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid storage credentials"));
    }
}
