//! Bounded processing queue and worker pool.
//!
//! The consumer loop submits a [`RecordStorage`] and gets back a
//! [`BatchFuture`]; one of a fixed pool of workers processes the batch and
//! resolves the future with per-batch statistics (plus the storage itself,
//! which the loop needs to compute the commit point) or a backend failure.
//!
//! `submit` awaits channel capacity when the queue is full; that blocking
//! is the pipeline's backpressure, keeping the poll rate bounded by the
//! drain rate. Workers complete batches in any order; the consumer's
//! commit gate restores a safe commit order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::storage::RecordStorage;

/// Per-batch processing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStat {
    pub processed: u64,
    pub dropped: u64,
}

/// Fatal backend failure: retries exhausted on a non-drop error, or an
/// unclassified response code. Stops the consumer.
#[derive(thiserror::Error, Debug, Clone)]
#[error("backend service failed: {0}")]
pub struct BackendFailure(pub String);

/// Successful processing outcome of one batch.
#[derive(Debug)]
pub struct RunResult {
    pub stat: SenderStat,
    pub storage: RecordStorage,
}

/// Processes one batch to completion. Implemented by backend sender
/// pipelines; tests substitute their own.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, storage: &RecordStorage) -> Result<SenderStat, BackendFailure>;
}

struct Job {
    storage: RecordStorage,
    done: oneshot::Sender<Result<RunResult, BackendFailure>>,
}

/// Handle for submitting batches to the worker pool.
pub struct BulkQueue {
    tx: mpsc::Sender<Job>,
}

impl BulkQueue {
    /// Create the queue and spawn its worker pool.
    ///
    /// `capacity` bounds the number of batches waiting beyond those being
    /// processed; `workers` is the pool size.
    pub fn start<P>(capacity: usize, workers: usize, processor: Arc<P>) -> Self
    where
        P: BatchProcessor + 'static,
    {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only while dequeuing, so the
                    // rest of the pool keeps draining during processing.
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        debug!(worker, "bulk queue closed, worker exiting");
                        return;
                    };

                    let result = processor
                        .process(&job.storage)
                        .await
                        .map(|stat| RunResult {
                            stat,
                            storage: job.storage,
                        });
                    // The receiver may have been dropped by a stopping
                    // consumer; that cancels the batch silently.
                    let _ = job.done.send(result);
                }
            });
        }

        Self { tx }
    }

    /// Hand a batch to the pool. Blocks while the queue is at capacity;
    /// this is the backpressure mechanism. Returns a future resolved by
    /// the worker that picks the batch up.
    pub async fn submit(&self, storage: RecordStorage) -> Result<BatchFuture, BackendFailure> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Job { storage, done })
            .await
            .map_err(|_| BackendFailure("bulk queue worker pool is gone".to_string()))?;
        Ok(BatchFuture {
            rx,
            resolved: None,
        })
    }
}

/// Completion handle for one submitted batch.
pub struct BatchFuture {
    rx: oneshot::Receiver<Result<RunResult, BackendFailure>>,
    resolved: Option<Result<RunResult, BackendFailure>>,
}

impl BatchFuture {
    /// Non-blocking resolution check; caches the result once available.
    pub fn is_done(&mut self) -> bool {
        if self.resolved.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(result) => {
                self.resolved = Some(result);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.resolved = Some(Err(BackendFailure(
                    "batch worker dropped without a result".to_string(),
                )));
                true
            }
        }
    }

    /// Wait for the result. Immediate if already resolved.
    pub async fn wait(self) -> Result<RunResult, BackendFailure> {
        if let Some(result) = self.resolved {
            return result;
        }
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(BackendFailure(
                "batch worker dropped without a result".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RecordStorage, StoredRecord, StreamPartition};
    use relay_protocol::EventBuilder;
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    fn storage_with(offsets: std::ops::Range<i64>) -> RecordStorage {
        let mut storage = RecordStorage::new(offsets.clone().count().max(1));
        for offset in offsets {
            storage.add(
                StoredRecord {
                    partition: StreamPartition::new("logs", 0),
                    offset,
                    key: None,
                },
                EventBuilder::new().build(),
            );
        }
        storage
    }

    struct CountingProcessor;

    #[async_trait]
    impl BatchProcessor for CountingProcessor {
        async fn process(&self, storage: &RecordStorage) -> Result<SenderStat, BackendFailure> {
            Ok(SenderStat {
                processed: storage.len() as u64,
                dropped: 0,
            })
        }
    }

    /// Blocks every batch until a permit is released; models stuck workers.
    struct GatedProcessor {
        release: Semaphore,
    }

    impl GatedProcessor {
        fn stuck() -> Self {
            Self {
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchProcessor for GatedProcessor {
        async fn process(&self, storage: &RecordStorage) -> Result<SenderStat, BackendFailure> {
            self.release
                .acquire()
                .await
                .expect("semaphore closed")
                .forget();
            Ok(SenderStat {
                processed: storage.len() as u64,
                dropped: 0,
            })
        }
    }

    #[tokio::test]
    async fn future_resolves_with_stats_and_storage() {
        let queue = BulkQueue::start(2, 1, Arc::new(CountingProcessor));
        let future = queue.submit(storage_with(10..13)).await.unwrap();

        let result = future.wait().await.unwrap();
        assert_eq!(result.stat.processed, 3);
        assert_eq!(
            result.storage.offsets()[&StreamPartition::new("logs", 0)],
            13
        );
    }

    #[tokio::test]
    async fn is_done_is_non_blocking_and_caches() {
        let processor = Arc::new(GatedProcessor::stuck());
        let queue = BulkQueue::start(2, 1, Arc::clone(&processor));
        let mut future = queue.submit(storage_with(0..1)).await.unwrap();

        assert!(!future.is_done());
        processor.release.add_permits(1);

        // Worker resolves shortly after release.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !future.is_done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("future never resolved");
        assert!(future.is_done());

        let result = future.wait().await.unwrap();
        assert_eq!(result.stat.processed, 1);
    }

    #[tokio::test]
    async fn full_queue_blocks_submission() {
        let processor = Arc::new(GatedProcessor::stuck());
        // One stuck worker plus a queue of 2: the first submission is taken
        // by the worker, two wait in the channel, the next must block.
        let queue = BulkQueue::start(2, 1, Arc::clone(&processor));

        let mut futures = Vec::new();
        for i in 0..3 {
            let start = i as i64 * 10;
            futures.push(queue.submit(storage_with(start..start + 10)).await.unwrap());
        }

        let blocked = queue.submit(storage_with(100..110));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), blocked)
                .await
                .is_err(),
            "submission past capacity should block, not drop or buffer"
        );

        // Releasing the worker unblocks the pipeline again.
        processor.release.add_permits(4);
        let drained = queue.submit(storage_with(100..110)).await.unwrap();
        for future in futures {
            future.wait().await.unwrap();
        }
        drained.wait().await.unwrap();
    }

    #[tokio::test]
    async fn workers_complete_out_of_order() {
        struct OffsetGated {
            release_first: Notify,
        }

        #[async_trait]
        impl BatchProcessor for OffsetGated {
            async fn process(
                &self,
                storage: &RecordStorage,
            ) -> Result<SenderStat, BackendFailure> {
                // The batch starting at offset 0 waits until released; later
                // batches complete immediately.
                if storage.records()[0].offset == 0 {
                    self.release_first.notified().await;
                }
                Ok(SenderStat {
                    processed: storage.len() as u64,
                    dropped: 0,
                })
            }
        }

        let processor = Arc::new(OffsetGated {
            release_first: Notify::new(),
        });
        let queue = BulkQueue::start(4, 2, Arc::clone(&processor));

        let mut first = queue.submit(storage_with(0..10)).await.unwrap();
        let second = queue.submit(storage_with(10..20)).await.unwrap();

        let second_result = tokio::time::timeout(Duration::from_secs(1), second.wait())
            .await
            .expect("second batch should complete while the first is stuck")
            .unwrap();
        assert_eq!(second_result.stat.processed, 10);
        assert!(!first.is_done());

        processor.release_first.notify_one();
        first.wait().await.unwrap();
    }
}
