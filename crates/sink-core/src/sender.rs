//! Backend sender contract, error classification and bounded retry.
//!
//! Classification is table-driven: each backend configures two code tables,
//! one for client/connection setup failures and one for send failures.
//! A code maps to retryable, non-retryable or unclassified; unclassified
//! codes are a hard system fault (a configuration gap, not a runtime
//! condition to guess at). Any code >= 500 is always retryable. Some codes
//! additionally mean "drop the batch after exhausting retries" instead of
//! escalating, e.g. a conflict/duplicate response.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use relay_protocol::Event;
use tracing::warn;

use crate::queue::{BackendFailure, BatchProcessor, SenderStat};
use crate::storage::RecordStorage;

/// Which interaction with the backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderStage {
    /// Establishing or configuring the backend client.
    ClientSetup,
    /// Sending a batch.
    Send,
}

/// A failed backend interaction, as reported by a [`BulkSender`].
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub stage: SenderStage,
    /// Response status code; `None` for transport-level faults with no
    /// response (connection refused, timeout), which are always retryable.
    pub code: Option<u16>,
    /// Backend-supplied wait hint before the next attempt.
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl ErrorInfo {
    pub fn send(code: u16, message: impl Into<String>) -> Self {
        Self {
            stage: SenderStage::Send,
            code: Some(code),
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn client_setup(code: u16, message: impl Into<String>) -> Self {
        Self {
            stage: SenderStage::ClientSetup,
            code: Some(code),
            retry_after: None,
            message: message.into(),
        }
    }

    /// A transport fault without a response code.
    pub fn transport(stage: SenderStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            code: None,
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{:?} failed with code {}: {}", self.stage, code, self.message),
            None => write!(f, "{:?} transport fault: {}", self.stage, self.message),
        }
    }
}

/// Three-way classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    NonRetryable,
    /// Not in either table: a hard fault.
    Unclassified,
}

/// Code table for one sender stage.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    retryable: HashSet<u16>,
    non_retryable: HashSet<u16>,
    drop_after_retry: HashSet<u16>,
}

impl ErrorClassifier {
    pub fn new(
        retryable: impl IntoIterator<Item = u16>,
        non_retryable: impl IntoIterator<Item = u16>,
        drop_after_retry: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            retryable: retryable.into_iter().collect(),
            non_retryable: non_retryable.into_iter().collect(),
            drop_after_retry: drop_after_retry.into_iter().collect(),
        }
    }

    /// Classify a response code. Codes >= 500 are always retryable; a
    /// missing code means a transport fault, also retryable.
    pub fn classify(&self, code: Option<u16>) -> Classification {
        match code {
            None => Classification::Retryable,
            Some(code) if code >= 500 || self.retryable.contains(&code) => {
                Classification::Retryable
            }
            Some(code) if self.non_retryable.contains(&code) => Classification::NonRetryable,
            Some(_) => Classification::Unclassified,
        }
    }

    /// Whether this code drops the batch after exhausted retries instead of
    /// escalating to a backend failure.
    pub fn drops_after_retry(&self, code: Option<u16>) -> bool {
        code.is_some_and(|code| self.drop_after_retry.contains(&code))
    }
}

/// The two independent per-stage tables of one backend.
#[derive(Debug, Clone, Default)]
pub struct ClassifierTables {
    pub client_setup: ErrorClassifier,
    pub send: ErrorClassifier,
}

impl ClassifierTables {
    fn for_stage(&self, stage: SenderStage) -> &ErrorClassifier {
        match stage {
            SenderStage::ClientSetup => &self.client_setup,
            SenderStage::Send => &self.send,
        }
    }
}

/// Converts a batch of decoded events into one backend call.
#[async_trait]
pub trait BulkSender: Send + Sync {
    async fn send(&self, events: &[Event]) -> Result<(), ErrorInfo>;
}

/// Drives a [`BulkSender`] with classification and bounded retry; the
/// [`BatchProcessor`] plugged into the bulk queue.
pub struct SenderPipeline<S> {
    sender: S,
    tables: ClassifierTables,
    retry_limit: usize,
}

impl<S: BulkSender> SenderPipeline<S> {
    pub fn new(sender: S, tables: ClassifierTables, retry_limit: usize) -> Self {
        Self {
            sender,
            tables,
            retry_limit,
        }
    }
}

#[async_trait]
impl<S: BulkSender> BatchProcessor for SenderPipeline<S> {
    async fn process(&self, storage: &RecordStorage) -> Result<SenderStat, BackendFailure> {
        let events = storage.events();
        if events.is_empty() {
            return Ok(SenderStat::default());
        }
        let count = events.len() as u64;

        let mut failures = 0usize;
        loop {
            let error = match self.sender.send(events).await {
                Ok(()) => {
                    return Ok(SenderStat {
                        processed: count,
                        dropped: 0,
                    })
                }
                Err(error) => error,
            };

            failures += 1;
            let classifier = self.tables.for_stage(error.stage);
            match classifier.classify(error.code) {
                Classification::NonRetryable => {
                    warn!(%error, count, "dropping batch on non-retryable backend error");
                    return Ok(SenderStat {
                        processed: 0,
                        dropped: count,
                    });
                }
                Classification::Unclassified => {
                    return Err(BackendFailure(format!(
                        "unclassified backend response: {error}"
                    )));
                }
                Classification::Retryable => {
                    if failures > self.retry_limit {
                        if classifier.drops_after_retry(error.code) {
                            warn!(%error, count, "dropping batch after exhausted retries");
                            return Ok(SenderStat {
                                processed: 0,
                                dropped: count,
                            });
                        }
                        return Err(BackendFailure(format!(
                            "retries exhausted after {failures} attempts: {error}"
                        )));
                    }
                    warn!(%error, attempt = failures, "retrying batch after backend error");
                    if let Some(wait) = error.retry_after {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StoredRecord, StreamPartition};
    use relay_protocol::EventBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new([408, 429, 409], [400, 403, 404], [409])
    }

    fn one_record_storage() -> RecordStorage {
        let mut storage = RecordStorage::new(1);
        storage.add(
            StoredRecord {
                partition: StreamPartition::new("logs", 0),
                offset: 0,
                key: None,
            },
            EventBuilder::new().build(),
        );
        storage
    }

    /// Sender that always fails with a fixed error, counting attempts.
    struct FailingSender {
        error: ErrorInfo,
        attempts: AtomicUsize,
    }

    impl FailingSender {
        fn new(error: ErrorInfo) -> Self {
            Self {
                error,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BulkSender for FailingSender {
        async fn send(&self, _events: &[Event]) -> Result<(), ErrorInfo> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    // ========================================================================
    // Classification tables
    // ========================================================================

    #[test]
    fn codes_at_or_above_500_are_always_retryable() {
        let table = ErrorClassifier::default();
        assert_eq!(table.classify(Some(500)), Classification::Retryable);
        assert_eq!(table.classify(Some(503)), Classification::Retryable);
    }

    #[test]
    fn transport_faults_without_a_code_are_retryable() {
        assert_eq!(classifier().classify(None), Classification::Retryable);
    }

    #[test]
    fn unknown_codes_are_unclassified() {
        assert_eq!(classifier().classify(Some(418)), Classification::Unclassified);
    }

    #[test]
    fn drop_flag_is_independent_of_retryability() {
        let table = classifier();
        assert_eq!(table.classify(Some(409)), Classification::Retryable);
        assert!(table.drops_after_retry(Some(409)));
        assert!(!table.drops_after_retry(Some(429)));
    }

    // ========================================================================
    // Retry policy
    // ========================================================================

    fn tables() -> ClassifierTables {
        ClassifierTables {
            client_setup: classifier(),
            send: classifier(),
        }
    }

    #[tokio::test]
    async fn retryable_error_makes_exactly_retry_limit_plus_one_attempts() {
        let sender = FailingSender::new(ErrorInfo::send(503, "unavailable"));
        let pipeline = SenderPipeline::new(sender, tables(), 3);

        let result = pipeline.process(&one_record_storage()).await;
        assert!(result.is_err(), "exhausted retries must escalate");
        assert_eq!(pipeline.sender.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn drop_after_retry_code_drops_instead_of_escalating() {
        let sender = FailingSender::new(ErrorInfo::send(409, "duplicate"));
        let pipeline = SenderPipeline::new(sender, tables(), 2);

        let stat = pipeline.process(&one_record_storage()).await.unwrap();
        assert_eq!(stat, SenderStat { processed: 0, dropped: 1 });
        assert_eq!(pipeline.sender.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_drops_immediately() {
        let sender = FailingSender::new(ErrorInfo::send(400, "bad request"));
        let pipeline = SenderPipeline::new(sender, tables(), 5);

        let stat = pipeline.process(&one_record_storage()).await.unwrap();
        assert_eq!(stat, SenderStat { processed: 0, dropped: 1 });
        assert_eq!(pipeline.sender.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unclassified_code_is_an_immediate_backend_failure() {
        let sender = FailingSender::new(ErrorInfo::client_setup(418, "teapot"));
        let pipeline = SenderPipeline::new(sender, tables(), 5);

        assert!(pipeline.process(&one_record_storage()).await.is_err());
        assert_eq!(pipeline.sender.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let sender = FailingSender::new(ErrorInfo::send(503, "unavailable"));
        let pipeline = SenderPipeline::new(sender, tables(), 1);

        let stat = pipeline.process(&RecordStorage::new(4)).await.unwrap();
        assert_eq!(stat, SenderStat::default());
        assert_eq!(pipeline.sender.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_send_counts_all_events_processed() {
        struct OkSender;

        #[async_trait]
        impl BulkSender for OkSender {
            async fn send(&self, _events: &[Event]) -> Result<(), ErrorInfo> {
                Ok(())
            }
        }

        let pipeline = SenderPipeline::new(OkSender, tables(), 1);
        let stat = pipeline.process(&one_record_storage()).await.unwrap();
        assert_eq!(stat, SenderStat { processed: 1, dropped: 0 });
    }
}
