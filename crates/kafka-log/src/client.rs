use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tracing::debug;

use relay_sink_core::{LogClient, LogError, LogRecord, StreamPartition};

use crate::config::KafkaLogConfig;

/// Hard upper bound on records returned by one poll call, on top of the
/// caller-supplied bound; the bulk consumer keeps polling until its own
/// batch is full or its budget expires.
const MAX_POLL_RECORDS: usize = 500;

/// How long to wait for further already-buffered records once the first
/// record of a poll has arrived.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

const WATERMARK_TIMEOUT: Duration = Duration::from_secs(5);

/// `LogClient` over an rdkafka stream consumer with manual offsets.
pub struct KafkaLogClient {
    consumer: StreamConsumer,
}

impl KafkaLogClient {
    pub fn new(config: &KafkaLogConfig) -> Result<Self, LogError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            // The bulk consumer commits offsets itself, only after a batch
            // is confirmed processed.
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| LogError::Subscription(format!("failed to create consumer: {e}")))?;

        Ok(Self { consumer })
    }

    fn convert(message: &BorrowedMessage<'_>) -> LogRecord {
        LogRecord {
            partition: StreamPartition::new(message.topic(), message.partition()),
            offset: message.offset(),
            key: message.key().map(|k| k.to_vec()),
            // A keyed tombstone without a payload decodes to nothing and is
            // dropped downstream with a warning.
            payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl LogClient for KafkaLogClient {
    async fn poll(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<LogRecord>, LogError> {
        let cap = max_records.min(MAX_POLL_RECORDS);
        let mut records = Vec::new();
        if cap == 0 {
            return Ok(records);
        }

        // Wait for the first record under the caller's budget.
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => return Ok(records),
            Ok(Err(e)) => return Err(LogError::Poll(e.to_string())),
            Ok(Ok(message)) => records.push(Self::convert(&message)),
        }

        // Then drain whatever is already buffered.
        while records.len() < cap {
            match tokio::time::timeout(DRAIN_TIMEOUT, self.consumer.recv()).await {
                Ok(Ok(message)) => records.push(Self::convert(&message)),
                Ok(Err(e)) => return Err(LogError::Poll(e.to_string())),
                Err(_) => break,
            }
        }

        debug!(count = records.len(), "polled records");
        Ok(records)
    }

    async fn commit(&mut self, offsets: &HashMap<StreamPartition, i64>) -> Result<(), LogError> {
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (partition, next_offset) in offsets {
            tpl.add_partition_offset(
                &partition.stream,
                partition.partition,
                Offset::Offset(*next_offset),
            )
            .map_err(|e| LogError::Commit(format!("failed to add partition offset: {e}")))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| LogError::Commit(e.to_string()))
    }

    async fn subscribe(&mut self, pattern: &str) -> Result<(), LogError> {
        self.consumer
            .subscribe(&[pattern])
            .map_err(|e| LogError::Subscription(e.to_string()))
    }

    async fn unsubscribe(&mut self) {
        self.consumer.unsubscribe();
    }

    async fn end_offsets(
        &mut self,
        partitions: &[StreamPartition],
    ) -> Result<HashMap<StreamPartition, i64>, LogError> {
        let mut offsets = HashMap::with_capacity(partitions.len());
        for partition in partitions {
            let (_, high) = self
                .consumer
                .fetch_watermarks(&partition.stream, partition.partition, WATERMARK_TIMEOUT)
                .map_err(|e| LogError::Poll(e.to_string()))?;
            offsets.insert(partition.clone(), high);
        }
        Ok(offsets)
    }
}
