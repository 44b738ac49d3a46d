//! Search-index backend sender for event-relay.
//!
//! Renders event batches as Elasticsearch `_bulk` NDJSON bodies and ships
//! them through a pluggable transport. Response codes are classified with
//! elastic-specific tables; a 409 conflict is retried and then dropped
//! rather than escalated, since it marks an already-indexed duplicate.

pub mod config;
pub mod http;
pub mod json;
pub mod sender;

pub use config::ElasticConfig;
pub use http::HttpBulkTransport;
pub use sender::{default_classifier_tables, BulkTransport, ElasticSender, TransportError};
