//! Kafka-backed log client for event-relay sinks.
//!
//! Implements the `LogClient` contract of `relay-sink-core` over an
//! `rdkafka` stream consumer with manual offset management: auto-commit is
//! disabled and offsets are committed synchronously only when the bulk
//! consumer confirms a batch.

pub mod client;
pub mod config;

pub use client::KafkaLogClient;
pub use config::KafkaLogConfig;
