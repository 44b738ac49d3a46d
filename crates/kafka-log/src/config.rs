use clap::Parser;

/// Configuration for the Kafka log client.
#[derive(Debug, Clone, Parser)]
pub struct KafkaLogConfig {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[clap(long, value_delimiter = ',', required = true)]
    pub brokers: Vec<String>,

    /// Consumer group ID
    #[clap(long)]
    pub group_id: String,

    /// Auto offset reset strategy ("earliest" or "latest").
    ///
    /// "earliest" starts from the beginning of each stream when the group
    /// has no committed offsets, which avoids missing events; "latest"
    /// starts from the end.
    #[clap(long, default_value = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[clap(long, default_value = "30000")]
    pub session_timeout_ms: String,
}
