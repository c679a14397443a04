//! Events as handed to processors

use std::borrow::Cow;

use azeventhubs::ReceivedEventData;
use time::{macros::datetime, OffsetDateTime};

use crate::error::PartitionError;

/// An event read from a partition, detached from the AMQP message it arrived in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    body: Vec<u8>,
    sequence_number: i64,
    offset: Option<i64>,
    enqueued_time: Option<OffsetDateTime>,
    partition_key: Option<String>,
}

/// What the client reports as enqueued time when the service did not send one
const UNSET_ENQUEUED_TIME: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

impl EventData {
    /// Creates an event from its parts
    pub fn new(body: impl Into<Vec<u8>>, sequence_number: i64, offset: Option<i64>) -> Self {
        Self {
            body: body.into(),
            sequence_number,
            offset,
            enqueued_time: None,
            partition_key: None,
        }
    }

    /// Sets the time the event was enqueued
    pub fn with_enqueued_time(mut self, enqueued_time: OffsetDateTime) -> Self {
        self.enqueued_time = Some(enqueued_time);
        self
    }

    /// Sets the key the event was partitioned by
    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// The raw payload
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The position of the event in its partition
    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    /// The service assigned offset of the event in its partition
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// When the event was enqueued in its partition, if the service said so
    pub fn enqueued_time(&self) -> Option<OffsetDateTime> {
        self.enqueued_time
    }

    /// The key the event was partitioned by, if the sender set one
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }
}

impl TryFrom<ReceivedEventData> for EventData {
    type Error = PartitionError;

    fn try_from(event: ReceivedEventData) -> Result<Self, Self::Error> {
        let body = event
            .body()
            .map_err(|err| PartitionError::InvalidBody(format!("{:?}", err)))?
            .to_vec();
        Ok(Self {
            body,
            sequence_number: event.sequence_number(),
            offset: event.offset(),
            enqueued_time: known_enqueued_time(event.enqueued_time()),
            partition_key: event.partition_key().map(ToString::to_string),
        })
    }
}

fn known_enqueued_time(enqueued_time: OffsetDateTime) -> Option<OffsetDateTime> {
    if enqueued_time == UNSET_ENQUEUED_TIME {
        None
    } else {
        Some(enqueued_time)
    }
}

/// Decoding of event payloads for display
pub trait EventDataExt {
    /// The payload decoded as UTF-8. Invalid sequences are replaced with U+FFFD.
    fn body_as_text(&self) -> Cow<'_, str>;
}

impl EventDataExt for EventData {
    #[inline]
    fn body_as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
