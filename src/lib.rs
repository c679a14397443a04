//! Dump messages from every partition of an Azure Event Hub to stdout.
//!
//! The event hub is read with [`azeventhubs`], one consumer client per partition. A small
//! processor host ([`processor::EventProcessorHost`]) runs one pump per partition, hands batches
//! of events to an [`processor::EventProcessor`] and checkpoints them through a
//! [`checkpoint::CheckpointStore`], by default blobs in an Azure Storage container.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventhub_dumper::{app, options::Options};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Options::parse_config([
//!         "eventhub-dumper",
//!         "--event-hub-connection-string",
//!         "Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>",
//!         "--event-hub-name",
//!         "<event-hub>",
//!         "--storage-connection-string",
//!         "DefaultEndpointsProtocol=https;AccountName=<account>;AccountKey=<key>",
//!         "--storage-container-name",
//!         "checkpoints",
//!     ])
//!     .map_err(|err| err.render())?;
//!
//!     app::connect_and_run(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Crate features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `native-tls` | Use `native-tls` for TLS. Enabled by default. |
//! | `rustls` | Use `rustls` for TLS. |
//! | `test_e2e` | Enables tests under `tests/` that talk to a live event hub |

#![deny(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod app;
pub mod checkpoint;
pub mod config;
pub mod connection_string;
pub mod dumper;
pub mod error;
pub mod event;
pub mod options;
pub mod output;
pub mod position;
pub mod processor;
pub mod source;

pub use config::Config;
pub use error::Error;
