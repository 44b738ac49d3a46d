//! Event codec.
//!
//! One event on the wire is `[u8 version][16-byte id][container payload]`.
//! A batch message is `[i32 count][event]*count`. The event id is a
//! time-ordered UUID (v7); the creation timestamp is derived from the id
//! and never stored redundantly.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decoder::{ContainerReader, Decoder};
use crate::encoder::Encoder;
use crate::error::{DecodeError, Result};
use crate::value::{Container, Value};

/// An immutable, versioned, timestamped record with a tag/value payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    version: u8,
    id: Uuid,
    payload: Container,
}

impl Event {
    /// The only event version currently defined.
    pub const VERSION: u8 = 1;

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &Container {
        &self.payload
    }

    /// Creation timestamp, derived from the time-ordered id.
    ///
    /// `None` for ids that carry no timestamp (non-v7 UUIDs).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let ts = self.id.get_timestamp()?;
        let (secs, nanos) = ts.to_unix();
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// Builder for producer-side event construction.
#[derive(Debug, Default)]
pub struct EventBuilder {
    id: Option<Uuid>,
    payload: Container,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit id instead of a freshly generated time-ordered one.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Add a payload tag.
    pub fn tag(mut self, name: impl Into<String>, value: Value) -> Self {
        self.payload.insert(name, value);
        self
    }

    pub fn build(self) -> Event {
        Event {
            version: Event::VERSION,
            id: self.id.unwrap_or_else(Uuid::now_v7),
            payload: self.payload,
        }
    }
}

/// Writes events and batch messages.
#[derive(Debug, Default)]
pub struct EventWriter;

impl EventWriter {
    pub fn write(encoder: &mut Encoder, event: &Event) {
        encoder.write_u8(event.version);
        encoder.write_uuid(&event.id);
        encoder.write_container(&event.payload);
    }

    /// Batch message: 4-byte record count followed by concatenated events.
    pub fn write_batch(encoder: &mut Encoder, events: &[Event]) {
        encoder.write_i32(events.len() as i32);
        for event in events {
            Self::write(encoder, event);
        }
    }
}

/// Reads events, optionally materializing only a subset of payload tags.
#[derive(Debug, Clone)]
pub struct EventReader {
    container_reader: ContainerReader,
}

impl EventReader {
    /// Materialize the full payload.
    pub fn parse_all_tags() -> Self {
        Self {
            container_reader: ContainerReader::read_all_tags(),
        }
    }

    /// Materialize only the named payload tags; others are skipped.
    pub fn parse_tags(tags: HashSet<String>) -> Self {
        Self {
            container_reader: ContainerReader::read_tags(tags),
        }
    }

    pub fn read(&self, decoder: &mut Decoder<'_>) -> Result<Event> {
        let version = decoder.read_u8()?;
        if version != Event::VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let id = decoder.read_uuid()?;
        let payload = self.container_reader.read(decoder)?;
        Ok(Event {
            version,
            id,
            payload,
        })
    }

    /// Read a batch message.
    pub fn read_batch(&self, decoder: &mut Decoder<'_>) -> Result<Vec<Event>> {
        let count = decoder.read_length()?;
        let mut events = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            events.push(self.read(decoder)?);
        }
        Ok(events)
    }
}
