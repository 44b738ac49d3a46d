//! Bulk sender over a pluggable transport, with elastic classifier tables.

use async_trait::async_trait;
use relay_protocol::Event;
use relay_sink_core::{BulkSender, ClassifierTables, ErrorClassifier, ErrorInfo, SenderStage};
use tracing::debug;

use crate::json::event_to_document;

/// Rough per-event body size used to presize the bulk buffer.
const EXPECTED_EVENT_SIZE: usize = 2048;

const EMPTY_INDEX_ACTION: &[u8] = b"{\"index\":{}}";

#[derive(thiserror::Error, Debug)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Executes one `_bulk` request and reports the response status code.
///
/// The concrete HTTP client stays behind this seam; tests substitute a
/// scripted transport.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn execute(&self, body: Vec<u8>) -> Result<u16, TransportError>;
}

/// Sends event batches to a search index as `_bulk` NDJSON requests.
pub struct ElasticSender<T> {
    transport: T,
    merge_properties_to_root: bool,
}

impl<T: BulkTransport> ElasticSender<T> {
    pub fn new(transport: T, merge_properties_to_root: bool) -> Self {
        Self {
            transport,
            merge_properties_to_root,
        }
    }
}

/// Render a batch as an NDJSON `_bulk` body: per event an empty index
/// action line followed by the document line.
pub fn render_bulk_body(events: &[Event], merge_properties_to_root: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(events.len() * EXPECTED_EVENT_SIZE);
    for event in events {
        body.extend_from_slice(EMPTY_INDEX_ACTION);
        body.push(b'\n');
        let document = event_to_document(event, merge_properties_to_root);
        // Serializing a string-keyed Value into a Vec cannot fail.
        if let Ok(line) = serde_json::to_vec(&document) {
            body.extend_from_slice(&line);
        }
        body.push(b'\n');
    }
    body
}

#[async_trait]
impl<T: BulkTransport> BulkSender for ElasticSender<T> {
    async fn send(&self, events: &[Event]) -> Result<(), ErrorInfo> {
        let body = render_bulk_body(events, self.merge_properties_to_root);
        let status = self
            .transport
            .execute(body)
            .await
            .map_err(|e| ErrorInfo::transport(SenderStage::Send, e.to_string()))?;

        if (200..300).contains(&status) {
            debug!(count = events.len(), "bulk request accepted");
            Ok(())
        } else {
            Err(ErrorInfo::send(status, "bulk request rejected"))
        }
    }
}

/// Default classification tables for the elastic backend.
///
/// 409 means the document already exists; it is retried (the conflict may
/// be a replay race) and dropped once retries are exhausted. Codes outside
/// these tables are a configuration gap and fail the sink.
pub fn default_classifier_tables() -> ClassifierTables {
    ClassifierTables {
        client_setup: ErrorClassifier::new(
            [404, 408, 409, 429],
            [400, 401, 403],
            [409],
        ),
        send: ErrorClassifier::new(
            [408, 409, 429],
            [400, 401, 403, 404, 413],
            [409],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::{EventBuilder, Value};
    use relay_sink_core::Classification;
    use std::sync::atomic::{AtomicU16, Ordering};

    struct FixedStatusTransport {
        status: AtomicU16,
        requests: AtomicU16,
    }

    impl FixedStatusTransport {
        fn new(status: u16) -> Self {
            Self {
                status: AtomicU16::new(status),
                requests: AtomicU16::new(0),
            }
        }
    }

    #[async_trait]
    impl BulkTransport for FixedStatusTransport {
        async fn execute(&self, _body: Vec<u8>) -> Result<u16, TransportError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.status.load(Ordering::SeqCst))
        }
    }

    fn events(n: usize) -> Vec<relay_protocol::Event> {
        (0..n)
            .map(|i| {
                EventBuilder::new()
                    .tag("seq", Value::Integer(i as i32))
                    .build()
            })
            .collect()
    }

    #[test]
    fn bulk_body_alternates_action_and_document_lines() {
        let body = render_bulk_body(&events(3), false);
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 6);
        for pair in lines.chunks(2) {
            assert_eq!(pair[0], "{\"index\":{}}");
            let doc: serde_json::Value = serde_json::from_str(pair[1]).unwrap();
            assert!(doc["@timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn accepted_status_is_ok() {
        let sender = ElasticSender::new(FixedStatusTransport::new(200), false);
        assert!(sender.send(&events(1)).await.is_ok());
        assert_eq!(sender.transport.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_status_surfaces_the_code() {
        let sender = ElasticSender::new(FixedStatusTransport::new(429), false);
        let error = sender.send(&events(1)).await.unwrap_err();
        assert_eq!(error.code, Some(429));
        assert_eq!(error.stage, SenderStage::Send);
    }

    #[test]
    fn default_tables_classify_elastic_codes() {
        let tables = default_classifier_tables();
        assert_eq!(tables.send.classify(Some(429)), Classification::Retryable);
        assert_eq!(tables.send.classify(Some(400)), Classification::NonRetryable);
        assert_eq!(tables.send.classify(Some(502)), Classification::Retryable);
        assert_eq!(tables.send.classify(Some(418)), Classification::Unclassified);
        assert!(tables.send.drops_after_retry(Some(409)));
        // Client setup tolerates a 404 (index not yet created) as retryable.
        assert_eq!(
            tables.client_setup.classify(Some(404)),
            Classification::Retryable
        );
    }
}
