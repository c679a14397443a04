//! Validated run configuration

use azeventhubs::{
    consumer::{EventHubConsumerClient, EventHubConsumerClientOptions},
    BasicRetryPolicy, EventHubsTransportType as TransportType,
};

use crate::processor::ProcessorOptions;

/// The consumer group every event hub has
pub const DEFAULT_CONSUMER_GROUP_NAME: &str =
    EventHubConsumerClient::<BasicRetryPolicy>::DEFAULT_CONSUMER_GROUP_NAME;

/// The protocol used to talk to the Event Hubs service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Transport {
    /// AMQP over TCP, port 5671
    #[default]
    AmqpTcp,

    /// AMQP over web sockets, port 443. Use this behind proxies that only allow HTTPS.
    #[value(alias = "amqp-websockets")]
    AmqpWebSockets,
}

impl From<Transport> for TransportType {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::AmqpTcp => TransportType::AmqpTcp,
            Transport::AmqpWebSockets => TransportType::AmqpWebSockets,
        }
    }
}

/// Validated configuration of a run. Built once by [`crate::options::Options::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Connection string of the Event Hubs namespace or of the event hub itself
    pub event_hub_connection_string: String,

    /// Name of the event hub to read
    pub event_hub_name: String,

    /// Connection string of the storage account holding checkpoints
    pub storage_connection_string: String,

    /// Name of the blob container holding checkpoints
    pub storage_container_name: String,

    /// Consumer group given on the command line, if any
    pub consumer_group: Option<String>,

    /// Protocol used to reach the event hub
    pub transport: Transport,

    /// Behaviour of the processor host
    pub processor_options: ProcessorOptions,

    pub(crate) fully_qualified_namespace: String,
    pub(crate) storage_account_name: String,
}

impl Config {
    /// The consumer group to read as: the one given, or [`DEFAULT_CONSUMER_GROUP_NAME`]
    pub fn consumer_group(&self) -> &str {
        self.consumer_group
            .as_deref()
            .unwrap_or(DEFAULT_CONSUMER_GROUP_NAME)
    }

    /// Namespace host parsed from the connection string, safe to print
    pub fn fully_qualified_namespace(&self) -> &str {
        &self.fully_qualified_namespace
    }

    /// Storage account parsed from the connection string, safe to print
    pub fn storage_account_name(&self) -> &str {
        &self.storage_account_name
    }

    /// Options for every consumer client opened during the run
    pub fn client_options(&self) -> EventHubConsumerClientOptions {
        let mut options = EventHubConsumerClientOptions::default();
        options.connection_options.transport_type = self.transport.into();
        options
    }
}
