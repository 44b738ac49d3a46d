//! Batch storage for consumed records.

use std::collections::HashMap;
use std::fmt;

use relay_protocol::Event;

/// A partition of a named stream in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamPartition {
    pub stream: String,
    pub partition: i32,
}

impl StreamPartition {
    pub fn new(stream: impl Into<String>, partition: i32) -> Self {
        Self {
            stream: stream.into(),
            partition,
        }
    }
}

impl fmt::Display for StreamPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.stream, self.partition)
    }
}

/// A raw record as handed over by the log client; the payload is an
/// undecoded wire event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub partition: StreamPartition,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Source metadata of one stored record.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub partition: StreamPartition,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
}

/// Fixed-capacity holder of decoded records plus their source offsets; the
/// unit of batching.
///
/// Tracks the highest offset seen per partition; [`RecordStorage::offsets`]
/// is the commit point once processing of the whole batch is confirmed.
#[derive(Debug)]
pub struct RecordStorage {
    capacity: usize,
    meta: Vec<StoredRecord>,
    events: Vec<Event>,
    last_offsets: HashMap<StreamPartition, i64>,
}

impl RecordStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            meta: Vec::with_capacity(capacity),
            events: Vec::with_capacity(capacity),
            last_offsets: HashMap::new(),
        }
    }

    /// Whether there is room for another record.
    pub fn available(&self) -> bool {
        self.free() > 0
    }

    /// Remaining capacity in records.
    pub fn free(&self) -> usize {
        self.capacity - self.meta.len()
    }

    /// Add a decoded record. Callers must check [`RecordStorage::available`]
    /// first; records beyond capacity belong in the next storage.
    pub fn add(&mut self, record: StoredRecord, event: Event) {
        debug_assert!(self.available());
        let last = self
            .last_offsets
            .entry(record.partition.clone())
            .or_insert(record.offset);
        *last = (*last).max(record.offset);
        self.meta.push(record);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Decoded events, in consumption order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Source metadata, aligned with [`RecordStorage::events`].
    pub fn records(&self) -> &[StoredRecord] {
        &self.meta
    }

    /// Commit point: for each partition present, the offset of the next
    /// record to consume (highest stored offset plus one).
    pub fn offsets(&self) -> HashMap<StreamPartition, i64> {
        self.last_offsets
            .iter()
            .map(|(partition, last)| (partition.clone(), last + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::EventBuilder;

    fn record(partition: i32, offset: i64) -> StoredRecord {
        StoredRecord {
            partition: StreamPartition::new("logs", partition),
            offset,
            key: None,
        }
    }

    #[test]
    fn capacity_is_enforced_through_available() {
        let mut storage = RecordStorage::new(2);
        assert!(storage.available());
        storage.add(record(0, 0), EventBuilder::new().build());
        storage.add(record(0, 1), EventBuilder::new().build());
        assert!(!storage.available());
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn offsets_are_next_offset_per_partition() {
        let mut storage = RecordStorage::new(10);
        storage.add(record(0, 5), EventBuilder::new().build());
        storage.add(record(0, 6), EventBuilder::new().build());
        storage.add(record(1, 41), EventBuilder::new().build());

        let offsets = storage.offsets();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[&StreamPartition::new("logs", 0)], 7);
        assert_eq!(offsets[&StreamPartition::new("logs", 1)], 42);
    }

    #[test]
    fn empty_storage_has_no_offsets() {
        let storage = RecordStorage::new(4);
        assert!(storage.is_empty());
        assert!(storage.offsets().is_empty());
    }
}
