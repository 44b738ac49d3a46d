//! Bulk ingestion pipeline for event-relay sinks.
//!
//! This crate provides:
//! - A polling/batching consumer loop over a partitioned append-only log,
//!   with at-least-once offset commits
//! - A bounded, backpressured processing queue drained by a worker pool
//! - A lifecycle state machine observable by health checks and shutdown
//!   hooks
//! - Backend error classification and bounded retry
//!
//! # Delivery guarantees
//!
//! Offsets are committed only at a resolved-contiguous boundary: the
//! consumer submits each batch to the queue, keeps the returned futures in
//! FIFO order, and commits the offsets of a confirmed batch only once every
//! older batch is also confirmed. Workers may complete batches out of
//! order; the commit gate restores a safe order. A backend failure is fatal
//! to the consumer and surfaces through the lifecycle state; it is never
//! silently skipped.

pub mod config;
pub mod consumer;
pub mod log;
pub mod metrics;
pub mod queue;
pub mod sender;
pub mod status;
pub mod storage;

pub use config::SinkConfig;
pub use consumer::BulkConsumer;
pub use log::{LogClient, LogError};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use queue::{BackendFailure, BatchFuture, BatchProcessor, BulkQueue, RunResult, SenderStat};
pub use sender::{
    BulkSender, Classification, ClassifierTables, ErrorClassifier, ErrorInfo, SenderPipeline,
    SenderStage,
};
pub use status::{SinkStatus, StatusFsm};
pub use storage::{LogRecord, RecordStorage, StoredRecord, StreamPartition};
