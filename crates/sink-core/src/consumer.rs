//! Bulk consumer loop.
//!
//! Owns the poll/batch/submit/commit cycle and drives the lifecycle state
//! machine. One consumer owns one log client exclusively; batches flow to
//! the worker pool through the bulk queue and resolve back as futures the
//! commit phase drains in FIFO order.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use relay_protocol::{Decoder, EventReader};
use tracing::{debug, error, info, warn};

use crate::config::SinkConfig;
use crate::log::{LogClient, LogError};
use crate::metrics::SinkMetrics;
use crate::queue::{BackendFailure, BatchFuture, BulkQueue};
use crate::status::StatusFsm;
use crate::storage::{LogRecord, RecordStorage, StoredRecord};

/// Why a consumer session (one subscribe-poll-commit run) ended.
#[derive(thiserror::Error, Debug)]
enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendFailure),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Polling/batching consumer over a partitioned log.
pub struct BulkConsumer<L: LogClient> {
    client: L,
    config: SinkConfig,
    stream_pattern: String,
    status: Arc<StatusFsm>,
    queue: BulkQueue,
    metrics: Arc<SinkMetrics>,
    reader: EventReader,
}

impl<L: LogClient> BulkConsumer<L> {
    pub fn new(
        client: L,
        config: SinkConfig,
        stream_pattern: impl Into<String>,
        status: Arc<StatusFsm>,
        queue: BulkQueue,
        metrics: Arc<SinkMetrics>,
    ) -> Self {
        Self {
            client,
            config,
            stream_pattern: stream_pattern.into(),
            status,
            queue,
            metrics,
            reader: EventReader::parse_all_tags(),
        }
    }

    /// Run until stopped or a backend failure. Transient infrastructure
    /// errors restart the session; on exit the subscription is dropped and
    /// outstanding batch futures are cancelled (not awaited).
    pub async fn run(mut self) {
        let mut outstanding: VecDeque<BatchFuture> = VecDeque::new();

        self.status.mark_init_completed();
        while self.status.is_active() {
            match self.run_session(&mut outstanding).await {
                Ok(()) => {}
                Err(SessionError::Backend(e)) => {
                    error!(error = %e, "backend failed, halting consumer");
                    self.status.mark_backend_failed();
                }
                Err(SessionError::Log(e)) if e.is_transient() => {
                    warn!(error = %e, "transient log error, restarting session");
                }
                Err(SessionError::Log(e)) => {
                    error!(error = %e, "log client error, restarting session");
                }
            }
            self.client.unsubscribe().await;
            // Dropping the futures cancels them without awaiting; their
            // uncommitted offsets will be re-delivered.
            outstanding.clear();
        }
        self.status.mark_stopped();
        info!(status = ?self.status.current(), "bulk consumer exited");
    }

    /// One session: wait to be runnable, subscribe, then cycle until the
    /// status leaves Running or an error ends the session.
    async fn run_session(
        &mut self,
        outstanding: &mut VecDeque<BatchFuture>,
    ) -> Result<(), SessionError> {
        self.status.wait_until_running_or_stopping().await;
        if !self.status.is_running() {
            return Ok(());
        }

        self.client.subscribe(&self.stream_pattern).await?;
        debug!(pattern = %self.stream_pattern, "subscribed");

        // Overflow from each poll phase carries over to the next cycle.
        let mut next = RecordStorage::new(self.config.batch_size);

        while self.status.is_running() {
            let cycle_started = Instant::now();
            let mut current = mem::replace(&mut next, RecordStorage::new(self.config.batch_size));

            self.poll_phase(&mut current, &mut next).await?;
            self.metrics.mark_received(current.len() as u64);

            if !current.is_empty() {
                let future = self.queue.submit(current).await?;
                outstanding.push_back(future);
            }

            self.commit_phase(outstanding).await?;
            self.metrics.record_cycle(cycle_started.elapsed());
        }
        Ok(())
    }

    /// Poll the log under the configured time budget, routing records into
    /// `current` until it is full and overflow into `next`. Each poll is
    /// bounded by the free space across both storages, so one poll can
    /// never deliver more than the two batches hold. A stop or suspend
    /// request interrupts the in-flight poll without discarding records
    /// polled so far.
    async fn poll_phase(
        &mut self,
        current: &mut RecordStorage,
        next: &mut RecordStorage,
    ) -> Result<(), SessionError> {
        let budget = self.config.poll_timeout();
        let started = Instant::now();
        let mut status_rx = self.status.subscribe();

        while current.available() {
            let elapsed = started.elapsed();
            if elapsed >= budget {
                break;
            }
            let max_records = current.free() + next.free();
            let polled = tokio::select! {
                _ = status_rx.changed() => None,
                records = self.client.poll(budget - elapsed, max_records) => Some(records?),
            };
            let Some(records) = polled else {
                // Status changed; interrupt the poll phase and let the
                // cycle continue with what was already polled.
                if !self.status.is_running() {
                    break;
                }
                continue;
            };
            for record in records {
                self.route_record(record, current, next);
            }
        }
        Ok(())
    }

    /// Decode one polled record and place it in the current batch, or the
    /// next one if the current is already full. A record that fails to
    /// decode is counted dropped; the skip/size invariant of the codec
    /// guarantees the failure cannot corrupt later records.
    fn route_record(
        &self,
        record: LogRecord,
        current: &mut RecordStorage,
        next: &mut RecordStorage,
    ) {
        let mut decoder = Decoder::new(&record.payload);
        let event = match self.reader.read(&mut decoder) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    partition = %record.partition,
                    offset = record.offset,
                    error = %e,
                    "dropping undecodable record"
                );
                self.metrics.mark_dropped(1);
                return;
            }
        };
        let stored = StoredRecord {
            partition: record.partition,
            offset: record.offset,
            key: record.key,
        };
        if current.available() {
            current.add(stored, event);
        } else if next.available() {
            next.add(stored, event);
        } else {
            // The client returned more records than the poll requested.
            // The record is not buffered and not committed past, so the log
            // re-delivers it.
            warn!(
                partition = %stored.partition,
                offset = stored.offset,
                "discarding record delivered beyond the requested poll bound"
            );
            self.metrics.mark_dropped(1);
        }
    }

    /// Drain resolved futures from the front of the FIFO and commit at
    /// resolved-contiguous boundaries.
    ///
    /// Offsets are committed only when the queue becomes empty or the new
    /// front is unresolved, i.e. for the newest batch whose processing is
    /// confirmed while all older batches are also confirmed. Committing on
    /// every resolution instead would violate the ordering invariant under
    /// out-of-order completion.
    async fn commit_phase(
        &mut self,
        outstanding: &mut VecDeque<BatchFuture>,
    ) -> Result<(), SessionError> {
        loop {
            let front_ready = match outstanding.front_mut() {
                None => break,
                Some(front) => front.is_done() || !self.status.is_running(),
            };
            if !front_ready {
                break;
            }
            let Some(future) = outstanding.pop_front() else {
                break;
            };

            // Immediate when already resolved; awaited only on the
            // shutdown path, mirroring the blocking get of the original
            // future queue.
            let result = future.wait().await?;

            let at_boundary = match outstanding.front_mut() {
                None => true,
                Some(front) => !front.is_done(),
            };
            if at_boundary {
                let offsets = result.storage.offsets();
                self.client.commit(&offsets).await?;
                debug!(batches_outstanding = outstanding.len(), "committed offsets");
            }

            self.metrics.mark_processed(result.stat.processed);
            self.metrics.mark_dropped(result.stat.dropped);
        }
        Ok(())
    }
}
