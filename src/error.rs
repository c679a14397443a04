//! Error types

use std::fmt;

/// A single problem found while validating the command line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    /// A required option was not provided
    #[error("missing required option '--{0}'")]
    MissingRequiredOption(&'static str),

    /// An option was provided but its value cannot be used
    #[error("malformed option '--{option}': {reason}")]
    MalformedOption {
        /// Name of the option, without the leading dashes
        option: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

impl OptionError {
    /// Name of the option this error refers to
    pub fn option(&self) -> &'static str {
        match self {
            OptionError::MissingRequiredOption(option) => option,
            OptionError::MalformedOption { option, .. } => option,
        }
    }
}

/// All problems found while validating the command line. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    errors: Vec<OptionError>,
}

impl ConfigValidationError {
    pub(crate) fn new(errors: Vec<OptionError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub(crate) fn from_error(error: OptionError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// The individual errors, missing options first
    pub fn errors(&self) -> &[OptionError] {
        &self.errors
    }

    /// Names of the required options that were not provided
    pub fn missing_options(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.errors.iter().filter_map(|err| match err {
            OptionError::MissingRequiredOption(option) => Some(*option),
            _ => None,
        })
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid option(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// The event hub or the checkpoint storage could not be reached
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct ConnectionError {
    context: String,
    #[source]
    source: azure_core::Error,
}

impl ConnectionError {
    pub(crate) fn new(context: impl Into<String>, source: azure_core::Error) -> Self {
        Self {
            context: context.into(),
            source,
        }
    }
}

/// An error scoped to a single partition. Never fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// The partition could not be opened for reading
    #[error("failed to open partition: {0}")]
    Open(#[source] azure_core::Error),

    /// Receiving from an open partition failed
    #[error("failed to receive events: {0}")]
    Receive(#[source] azure_core::Error),

    /// The body of a received event could not be read
    #[error("invalid event body: {0}")]
    InvalidBody(String),

    /// The stored checkpoint of the partition could not be loaded
    #[error("failed to load checkpoint: {0}")]
    Checkpoint(#[source] CheckpointError),

    /// A processor hook reported a failure
    #[error("event processor failed: {0}")]
    Processor(String),
}

/// A checkpoint could not be read or written. The next successful checkpoint supersedes it.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// There is no processed event to checkpoint yet
    #[error("no event has been processed on this partition")]
    NothingToCheckpoint,

    /// The storage backend rejected the request
    #[error("checkpoint storage failed: {0}")]
    Storage(#[from] azure_core::Error),

    /// The stored checkpoint could not be encoded or decoded
    #[error("checkpoint is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The processor host was driven through an invalid state transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// `register_event_processor` was called while not stopped
    #[error("an event processor is already registered")]
    AlreadyRegistered,

    /// `unregister_event_processor` was called while not running
    #[error("no event processor is registered")]
    NotRegistered,
}

/// Top level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid command line
    #[error(transparent)]
    ConfigValidation(#[from] ConfigValidationError),

    /// Backend unreachable at startup
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Partition scoped error
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Checkpoint scoped error
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// State machine misuse
    #[error(transparent)]
    Host(#[from] HostError),

    /// Reading the shutdown signal failed
    #[error("failed to wait for the shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}
