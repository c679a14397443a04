//! Command line options
//!
//! ```bash
//! eventhub-dumper \
//!   --event-hub-connection-string "Endpoint=sb://<ns>.servicebus.windows.net/;SharedAccessKeyName=<policy>;SharedAccessKey=<key>" \
//!   --event-hub-name telemetry \
//!   --storage-connection-string "DefaultEndpointsProtocol=https;AccountName=<account>;AccountKey=<key>" \
//!   --storage-container-name checkpoints
//! ```
//!
//! Every option can also be given through the environment variable named in `--help`, or a
//! `.env` file in the working directory.

use std::ffi::OsString;
use std::time::Duration;

use clap::{error::ErrorKind, Command, CommandFactory, FromArgMatches, Parser};

use crate::{
    config::{Config, Transport},
    connection_string::{EventHubConnectionProperties, StorageConnectionProperties},
    error::{ConfigValidationError, OptionError},
    position::InitialPosition,
    processor::ProcessorOptions,
};

/// Exit status of a run that completed normally
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status after `--help` or `--version`
pub const EXIT_HELP_OR_VERSION: i32 = -1;

/// Exit status when the command line is invalid
pub const EXIT_PARSE_ERROR: i32 = -2;

/// Exit status when the run failed after the command line was accepted
pub const EXIT_FAILURE: i32 = 1;

const EVENT_HUB_CONNECTION_STRING: &str = "event-hub-connection-string";
const EVENT_HUB_NAME: &str = "event-hub-name";
const STORAGE_CONNECTION_STRING: &str = "storage-connection-string";
const STORAGE_CONTAINER_NAME: &str = "storage-container-name";
const CONSUMER_GROUP: &str = "consumer-group";

/// Dump messages from every partition of an Azure Event Hub to stdout
#[derive(Debug, Clone, Parser)]
#[command(name = "eventhub-dumper", version, about, long_about = None)]
pub struct Options {
    /// Required EventHub connection string in the format
    /// "Endpoint=sb://?.servicebus.windows.net/;SharedAccessKeyName=?;SharedAccessKey=?[;EntityPath=?]".
    /// Get this from Azure Portal.
    #[arg(long, env = "EVENT_HUB_CONNECTION_STRING", hide_env_values = true)]
    pub event_hub_connection_string: Option<String>,

    /// Required EventHub name. Get this from Azure Portal.
    #[arg(long, env = "EVENT_HUB_NAME")]
    pub event_hub_name: Option<String>,

    /// Required storage connection string in the format
    /// "DefaultEndpointsProtocol=https;AccountName=?;AccountKey=?".
    #[arg(long, env = "STORAGE_CONNECTION_STRING", hide_env_values = true)]
    pub storage_connection_string: Option<String>,

    /// Required storage container name. Created when it does not exist.
    #[arg(long, env = "STORAGE_CONTAINER_NAME")]
    pub storage_container_name: Option<String>,

    /// Optional consumer group. Defaults to "$Default".
    #[arg(long, env = "CONSUMER_GROUP")]
    pub consumer_group: Option<String>,

    /// Where partitions start reading when they are opened
    #[arg(long, value_enum, default_value_t = InitialPosition::Now)]
    pub initial_position: InitialPosition,

    /// Largest number of events handed over, and checkpointed, at once
    #[arg(long, default_value_t = ProcessorOptions::DEFAULT_MAX_BATCH_SIZE,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_batch_size: u32,

    /// Seconds to wait before reopening a partition whose reader stopped
    #[arg(long, default_value_t = ProcessorOptions::DEFAULT_PARTITION_RETRY_DELAY.as_secs())]
    pub partition_retry_delay_secs: u64,

    /// Protocol used to reach the event hub
    #[arg(long, value_enum, default_value_t = Transport::AmqpTcp)]
    pub transport: Transport,
}

/// Why the command line did not produce a [`Config`]
#[derive(Debug)]
pub enum ParseError {
    /// Rejected by the argument parser, including `--help` and `--version`
    Arguments(clap::Error),

    /// Parsed, but required values are missing or malformed
    Validation(ConfigValidationError),
}

impl ParseError {
    /// `true` for `--help` and `--version`, which are not errors
    pub fn is_help_or_version(&self) -> bool {
        match self {
            ParseError::Arguments(err) => matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ),
            ParseError::Validation(_) => false,
        }
    }

    /// Number of problems reported, 0 for help and version
    pub fn error_count(&self) -> usize {
        match self {
            _ if self.is_help_or_version() => 0,
            ParseError::Arguments(_) => 1,
            ParseError::Validation(err) => err.errors().len(),
        }
    }

    /// [`EXIT_HELP_OR_VERSION`] or [`EXIT_PARSE_ERROR`]
    pub fn exit_code(&self) -> i32 {
        if self.is_help_or_version() {
            EXIT_HELP_OR_VERSION
        } else {
            EXIT_PARSE_ERROR
        }
    }

    /// The text to show the operator
    pub fn render(&self) -> String {
        match self {
            ParseError::Arguments(err) => err.render().to_string(),
            ParseError::Validation(err) => format!("error: {}", err),
        }
    }
}

impl Options {
    /// Parses and validates a full argument list, program name first
    pub fn parse_config<I, T>(args: I) -> Result<Config, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::parse_config_with(Self::command(), args)
    }

    fn parse_config_with<I, T>(command: Command, args: I) -> Result<Config, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command
            .try_get_matches_from(args)
            .map_err(ParseError::Arguments)?;
        let options = Options::from_arg_matches(&matches).map_err(ParseError::Arguments)?;
        options.validate().map_err(ParseError::Validation)
    }

    /// Checks every option and reports all problems at once, missing options first
    pub fn validate(self) -> Result<Config, ConfigValidationError> {
        let mut missing = Vec::new();
        let mut malformed = Vec::new();

        let event_hub_connection_string = required(
            EVENT_HUB_CONNECTION_STRING,
            self.event_hub_connection_string,
            &mut missing,
            &mut malformed,
        );
        let event_hub_name = required(EVENT_HUB_NAME, self.event_hub_name, &mut missing, &mut malformed);
        let storage_connection_string = required(
            STORAGE_CONNECTION_STRING,
            self.storage_connection_string,
            &mut missing,
            &mut malformed,
        );
        let storage_container_name = required(
            STORAGE_CONTAINER_NAME,
            self.storage_container_name,
            &mut missing,
            &mut malformed,
        );

        let consumer_group = match self.consumer_group {
            Some(group) if group.trim().is_empty() => {
                malformed.push(OptionError::MalformedOption {
                    option: CONSUMER_GROUP,
                    reason: "value is empty".to_string(),
                });
                None
            }
            other => other,
        };

        let event_hub = event_hub_connection_string.as_deref().and_then(|value| {
            match EventHubConnectionProperties::parse(value) {
                Ok(properties) => Some(properties),
                Err(reason) => {
                    malformed.push(OptionError::MalformedOption {
                        option: EVENT_HUB_CONNECTION_STRING,
                        reason,
                    });
                    None
                }
            }
        });
        if let (Some(properties), Some(name)) = (&event_hub, &event_hub_name) {
            if let Err(reason) = properties.check_event_hub_name(name) {
                malformed.push(OptionError::MalformedOption {
                    option: EVENT_HUB_CONNECTION_STRING,
                    reason,
                });
            }
        }

        let storage = storage_connection_string.as_deref().and_then(|value| {
            match StorageConnectionProperties::parse(value) {
                Ok(properties) => Some(properties),
                Err(reason) => {
                    malformed.push(OptionError::MalformedOption {
                        option: STORAGE_CONNECTION_STRING,
                        reason,
                    });
                    None
                }
            }
        });

        missing.append(&mut malformed);
        let (
            Some(event_hub_connection_string),
            Some(event_hub_name),
            Some(storage_connection_string),
            Some(storage_container_name),
            Some(event_hub),
            Some(storage),
        ) = (
            event_hub_connection_string,
            event_hub_name,
            storage_connection_string,
            storage_container_name,
            event_hub,
            storage,
        )
        else {
            // Every absent value above pushed an error
            return Err(ConfigValidationError::new(missing).unwrap_or_else(|| {
                ConfigValidationError::from_error(OptionError::MalformedOption {
                    option: EVENT_HUB_CONNECTION_STRING,
                    reason: "incomplete configuration".to_string(),
                })
            }));
        };
        if let Some(err) = ConfigValidationError::new(missing) {
            return Err(err);
        }

        Ok(Config {
            event_hub_connection_string,
            event_hub_name,
            storage_connection_string,
            storage_container_name,
            consumer_group,
            transport: self.transport,
            processor_options: ProcessorOptions::new()
                .with_max_batch_size(self.max_batch_size)
                .with_initial_position(self.initial_position)
                .with_partition_retry_delay(Duration::from_secs(self.partition_retry_delay_secs)),
            fully_qualified_namespace: event_hub.fully_qualified_namespace,
            storage_account_name: storage.account_name,
        })
    }
}

fn required(
    option: &'static str,
    value: Option<String>,
    missing: &mut Vec<OptionError>,
    malformed: &mut Vec<OptionError>,
) -> Option<String> {
    match value {
        None => {
            missing.push(OptionError::MissingRequiredOption(option));
            None
        }
        Some(value) if value.trim().is_empty() => {
            malformed.push(OptionError::MalformedOption {
                option,
                reason: "value is empty".to_string(),
            });
            None
        }
        Some(value) => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONSUMER_GROUP_NAME;

    const EVENT_HUB: &str = "Endpoint=sb://my-ns.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=a2V5";
    const STORAGE: &str = "DefaultEndpointsProtocol=https;AccountName=checkpoints;AccountKey=a2V5";

    /// Parses `args` with the environment fallbacks turned off
    fn parse_args(args: &[&str]) -> Result<Config, ParseError> {
        let command = [
            "event_hub_connection_string",
            "event_hub_name",
            "storage_connection_string",
            "storage_container_name",
            "consumer_group",
        ]
        .into_iter()
        .fold(Options::command(), |command, id| {
            command.mut_arg(id, |arg| arg.env(None::<&str>))
        });
        Options::parse_config_with(command, args.iter().copied())
    }

    fn options() -> Options {
        Options {
            event_hub_connection_string: Some(EVENT_HUB.to_string()),
            event_hub_name: Some("telemetry".to_string()),
            storage_connection_string: Some(STORAGE.to_string()),
            storage_container_name: Some("dumper".to_string()),
            consumer_group: None,
            initial_position: InitialPosition::Now,
            max_batch_size: 10,
            partition_retry_delay_secs: 5,
            transport: Transport::AmqpTcp,
        }
    }

    #[test]
    fn all_required_options_round_trip() {
        let config = options().validate().unwrap();
        assert_eq!(config.event_hub_connection_string, EVENT_HUB);
        assert_eq!(config.event_hub_name, "telemetry");
        assert_eq!(config.storage_connection_string, STORAGE);
        assert_eq!(config.storage_container_name, "dumper");
        assert_eq!(config.fully_qualified_namespace(), "my-ns.servicebus.windows.net");
        assert_eq!(config.storage_account_name(), "checkpoints");
    }

    #[test]
    fn consumer_group_defaults_to_default_group() {
        let config = options().validate().unwrap();
        assert_eq!(config.consumer_group, None);
        assert_eq!(config.consumer_group(), DEFAULT_CONSUMER_GROUP_NAME);
        assert_eq!(config.consumer_group(), "$Default");

        let mut with_group = options();
        with_group.consumer_group = Some("dashboards".to_string());
        assert_eq!(with_group.validate().unwrap().consumer_group(), "dashboards");
    }

    #[test]
    fn every_missing_option_is_reported() {
        let mut opts = options();
        opts.event_hub_connection_string = None;
        opts.storage_container_name = None;
        opts.event_hub_name = None;
        let err = opts.validate().unwrap_err();
        let missing: Vec<_> = err.missing_options().collect();
        assert_eq!(
            missing,
            vec![EVENT_HUB_CONNECTION_STRING, EVENT_HUB_NAME, STORAGE_CONTAINER_NAME]
        );
    }

    #[test]
    fn missing_options_come_before_malformed_ones() {
        let mut opts = options();
        opts.storage_connection_string = Some("AccountName=checkpoints;AccountKey=!!".to_string());
        opts.event_hub_name = None;
        let err = opts.validate().unwrap_err();
        assert_eq!(
            err.errors()[0],
            OptionError::MissingRequiredOption(EVENT_HUB_NAME)
        );
        assert_eq!(err.errors()[1].option(), STORAGE_CONNECTION_STRING);
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn empty_values_are_malformed() {
        let mut opts = options();
        opts.event_hub_name = Some("  ".to_string());
        opts.consumer_group = Some(String::new());
        let err = opts.validate().unwrap_err();
        let options: Vec<_> = err.errors().iter().map(OptionError::option).collect();
        assert_eq!(options, vec![EVENT_HUB_NAME, CONSUMER_GROUP]);
        assert_eq!(err.missing_options().count(), 0);
    }

    #[test]
    fn entity_path_must_match_event_hub_name() {
        let mut opts = options();
        opts.event_hub_connection_string = Some(format!("{};EntityPath=other", EVENT_HUB));
        let err = opts.validate().unwrap_err();
        assert_eq!(err.errors()[0].option(), EVENT_HUB_CONNECTION_STRING);
    }

    #[test]
    fn parse_config_from_command_line() {
        let config = parse_args(&[
            "eventhub-dumper",
            "--event-hub-connection-string",
            EVENT_HUB,
            "--event-hub-name",
            "telemetry",
            "--storage-connection-string",
            STORAGE,
            "--storage-container-name",
            "dumper",
            "--initial-position",
            "checkpoint",
            "--max-batch-size",
            "50",
            "--transport",
            "amqp-web-sockets",
        ])
        .unwrap();
        assert_eq!(config.event_hub_name, "telemetry");
        assert_eq!(config.processor_options.max_batch_size, 50);
        assert_eq!(config.processor_options.initial_position, InitialPosition::Checkpoint);
        assert_eq!(config.transport, Transport::AmqpWebSockets);
    }

    #[test]
    fn two_of_four_required_options_is_a_parse_error() {
        let err = parse_args(&[
            "eventhub-dumper",
            "--event-hub-connection-string",
            EVENT_HUB,
            "--event-hub-name",
            "telemetry",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_PARSE_ERROR);
        assert_eq!(err.error_count(), 2);
        let rendered = err.render();
        assert!(rendered.contains("--storage-connection-string"));
        assert!(rendered.contains("--storage-container-name"));
    }

    #[test]
    fn environment_fills_in_missing_options() {
        // Only this test touches these variables; every other test parses without fallbacks
        std::env::set_var("STORAGE_CONNECTION_STRING", STORAGE);
        std::env::set_var("STORAGE_CONTAINER_NAME", "from-env");
        let args = [
            "eventhub-dumper",
            "--event-hub-connection-string",
            EVENT_HUB,
            "--event-hub-name",
            "telemetry",
        ];

        let config = Options::parse_config(args).unwrap();
        assert_eq!(config.storage_container_name, "from-env");
        assert_eq!(config.storage_account_name(), "checkpoints");

        let err = parse_args(&args).unwrap_err();
        assert_eq!(err.error_count(), 2);
    }

    #[test]
    fn help_and_version_are_not_errors() {
        let help = parse_args(&["eventhub-dumper", "--help"]).unwrap_err();
        assert!(help.is_help_or_version());
        assert_eq!(help.exit_code(), EXIT_HELP_OR_VERSION);
        assert!(help.render().contains("--event-hub-connection-string"));

        let version = parse_args(&["eventhub-dumper", "--version"]).unwrap_err();
        assert_eq!(version.exit_code(), EXIT_HELP_OR_VERSION);
        assert_eq!(version.error_count(), 0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = parse_args(&["eventhub-dumper", "--max-batch-size", "0"]).unwrap_err();
        assert!(!err.is_help_or_version());
        assert_eq!(err.exit_code(), EXIT_PARSE_ERROR);
    }
}
