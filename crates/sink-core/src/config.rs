use clap::Parser;
use std::time::Duration;

/// Configuration for the bulk ingestion pipeline.
#[derive(Debug, Clone, Parser)]
pub struct SinkConfig {
    /// Maximum number of records per batch. Also the capacity of each
    /// record storage; records polled beyond it carry over to the next
    /// cycle.
    #[clap(long, default_value_t = 1000)]
    pub batch_size: usize,

    /// Poll-phase time budget in milliseconds. Each cycle polls the log
    /// until the batch is full or this budget is exhausted.
    #[clap(long, default_value_t = 2000)]
    pub poll_timeout_ms: u64,

    /// Number of batches that may wait in the processing queue beyond those
    /// currently being processed. Submission blocks when the queue is full;
    /// this is the pipeline's backpressure bound.
    #[clap(long, default_value_t = 4)]
    pub queue_capacity: usize,

    /// Number of parallel workers draining the processing queue.
    #[clap(long, default_value_t = 4)]
    pub workers: usize,

    /// Maximum number of retries for a retryable backend failure. A batch
    /// is attempted at most `retry_limit + 1` times before escalating.
    #[clap(long, default_value_t = 3)]
    pub retry_limit: usize,
}

impl SinkConfig {
    /// Poll-phase time budget.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
