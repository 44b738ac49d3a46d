//! Contract with the external partitioned log service.
//!
//! The log is a black box: monotonically increasing offsets per partition,
//! at-least-once commit semantics (uncommitted records are re-delivered
//! after a crash). The consumer loop owns its client exclusively and never
//! calls it concurrently.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::{LogRecord, StreamPartition};

#[derive(thiserror::Error, Debug)]
pub enum LogError {
    /// Offset commit rejected, typically because the consumer was kicked
    /// from its group by a coordination timeout. Transient: the loop
    /// resubscribes and retries from the last committed offsets.
    #[error("commit failed: {0}")]
    Commit(String),

    #[error("poll failed: {0}")]
    Poll(String),

    #[error("subscription failed: {0}")]
    Subscription(String),
}

impl LogError {
    /// Transient errors restart the consumer session without state loss;
    /// everything else is logged at error level before the restart.
    pub fn is_transient(&self) -> bool {
        matches!(self, LogError::Commit(_))
    }
}

/// Client for a partitioned append-only log.
#[async_trait]
pub trait LogClient: Send {
    /// Poll for new records, waiting at most `timeout` and returning at
    /// most `max_records` records. The bound keeps one poll from
    /// over-delivering the caller's batch capacity; records past it stay in
    /// the log and are returned by later polls. An empty result means the
    /// budget expired with nothing available.
    async fn poll(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<LogRecord>, LogError>;

    /// Commit consumed offsets (the next offset to read, per partition).
    async fn commit(&mut self, offsets: &HashMap<StreamPartition, i64>) -> Result<(), LogError>;

    /// Subscribe to every stream matching `pattern`.
    async fn subscribe(&mut self, pattern: &str) -> Result<(), LogError>;

    /// Drop the current subscription. Safe to call when not subscribed.
    async fn unsubscribe(&mut self);

    /// Current end offsets (one past the last record) of the given
    /// partitions; used for lag inspection.
    async fn end_offsets(
        &mut self,
        partitions: &[StreamPartition],
    ) -> Result<HashMap<StreamPartition, i64>, LogError>;
}
