//! Wires a [`Config`] to a processor host that dumps every partition until told to stop

use std::{future::Future, io, sync::Arc};

use tokio::sync::oneshot;

use crate::{
    checkpoint::{BlobCheckpointStore, CheckpointStore},
    config::Config,
    dumper::Dumper,
    error::Error,
    output::{Output, Stdout},
    processor::{EventProcessorHost, PartitionContext},
    source::{EventHubSource, EventSource},
};

/// Prints what the run is about to connect to, without secrets
pub fn print_banner(config: &Config, output: &dyn Output) {
    output.write_line("Running...");
    output.write_line(&format!(
        "Connecting to {} with {}",
        config.fully_qualified_namespace(),
        config.storage_account_name()
    ));
    output.write_line(&format!("Consumer group is: {}", config.consumer_group()));
}

/// Dumps every partition of the configured event hub until `shutdown` completes.
///
/// The processor host is always unregistered before returning once it was registered, even when
/// `shutdown` fails.
pub async fn run<S, F>(
    config: &Config,
    source: S,
    checkpoint_store: Arc<dyn CheckpointStore>,
    output: Arc<dyn Output>,
    shutdown: F,
) -> Result<(), Error>
where
    S: EventSource,
    F: Future<Output = io::Result<()>>,
{
    let mut host = EventProcessorHost::new(
        &config.event_hub_name,
        config.consumer_group(),
        source,
        checkpoint_store,
        config.processor_options.clone(),
    );

    let processor_output = output.clone();
    host.register_event_processor(move |_: &PartitionContext| {
        Dumper::new(processor_output.clone())
    })
    .await?;
    output.write_line("Receiving. Press ENTER or Ctrl-C to stop worker.");

    let signal = shutdown.await;
    if let Err(err) = &signal {
        log::error!("Waiting for the shutdown signal failed: {}", err);
    }

    host.unregister_event_processor().await?;
    output.write_line("Stopped receiving.");
    signal.map_err(Into::into)
}

/// Connects to the checkpoint storage and the event hub, then dumps to stdout until ENTER or
/// Ctrl-C
pub async fn connect_and_run(config: Config) -> Result<(), Error> {
    let output: Arc<dyn Output> = Arc::new(Stdout);
    print_banner(&config, output.as_ref());

    let checkpoint_store = BlobCheckpointStore::connect(
        &config.storage_connection_string,
        &config.storage_container_name,
        &config.event_hub_name,
        config.consumer_group(),
    )
    .await?;
    let source = EventHubSource::from_config(&config);

    run(
        &config,
        source,
        Arc::new(checkpoint_store),
        output,
        shutdown_signal(),
    )
    .await
}

/// Completes on Ctrl-C, on the first line read from stdin, or when stdin is closed.
///
/// Stdin is read on a plain thread: a blocking read on the runtime's blocking pool would keep the
/// runtime from shutting down.
pub async fn shutdown_signal() -> io::Result<()> {
    let (line_tx, line_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-shutdown".to_string())
        .spawn(move || {
            let mut line = String::new();
            let result = io::stdin().read_line(&mut line).map(|_| ());
            let _ = line_tx.send(result);
        })?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            log::debug!("Ctrl-C received");
            result
        }
        result = line_rx => {
            log::debug!("Stdin line received");
            result.unwrap_or(Ok(()))
        }
    }
}
