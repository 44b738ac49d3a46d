//! Command-line interface for event-relay
//!
//! Runs a bulk sink that consumes wire-format events from Kafka and ships
//! them to an Elasticsearch index.
//!
//! # Usage Examples
//!
//! ```bash
//! # Relay every stream matching a pattern into one index
//! event-relay \
//!   --brokers localhost:9092 \
//!   --group-id relay-metrics \
//!   --stream-pattern '^metrics-.*' \
//!   --elastic-index metrics
//!
//! # Tune batching and parallelism, flatten event properties
//! event-relay \
//!   --brokers kafka-1:9092,kafka-2:9092 \
//!   --group-id relay-logs \
//!   --stream-pattern logs \
//!   --elastic-endpoint http://search:9200 \
//!   --elastic-index logs \
//!   --batch-size 5000 --workers 8 --queue-capacity 8 \
//!   --merge-properties-to-root
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use relay_elastic_sink::{
    default_classifier_tables, ElasticConfig, ElasticSender, HttpBulkTransport,
};
use relay_kafka_log::{KafkaLogClient, KafkaLogConfig};
use relay_sink_core::{
    BulkConsumer, BulkQueue, SenderPipeline, SinkConfig, SinkMetrics, SinkStatus, StatusFsm,
};

#[derive(Parser)]
#[command(name = "event-relay")]
#[command(about = "Bulk sink relaying typed events from Kafka to Elasticsearch")]
struct Cli {
    /// Stream subscription pattern (a literal stream name or a regex)
    #[arg(long)]
    stream_pattern: String,

    /// Kafka consumer options
    #[command(flatten)]
    kafka: KafkaLogConfig,

    /// Batching and pipeline options
    #[command(flatten)]
    sink: SinkConfig,

    /// Elasticsearch target options
    #[command(flatten)]
    elastic: ElasticConfig,

    /// Seconds between pipeline counter reports
    #[arg(long, default_value_t = 60)]
    metrics_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let transport =
        HttpBulkTransport::new(&cli.elastic.elastic_endpoint, &cli.elastic.elastic_index)
            .with_context(|| {
                format!(
                    "Failed to build bulk transport for {}",
                    cli.elastic.elastic_endpoint
                )
            })?;
    let sender = ElasticSender::new(transport, cli.elastic.merge_properties_to_root);
    let pipeline = SenderPipeline::new(sender, default_classifier_tables(), cli.sink.retry_limit);
    let queue = BulkQueue::start(
        cli.sink.queue_capacity,
        cli.sink.workers,
        Arc::new(pipeline),
    );

    let status = Arc::new(StatusFsm::new());
    let metrics = Arc::new(SinkMetrics::default());

    let client = KafkaLogClient::new(&cli.kafka).context("Failed to create Kafka consumer")?;
    let consumer = BulkConsumer::new(
        client,
        cli.sink.clone(),
        &cli.stream_pattern,
        Arc::clone(&status),
        queue,
        Arc::clone(&metrics),
    );

    // First Ctrl-C requests a graceful stop; the consumer finishes its
    // current cycle, commits what is confirmed and exits.
    {
        let status = Arc::clone(&status);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, stopping sink");
                status.stop();
            }
        });
    }

    let reporter = spawn_metrics_reporter(
        Arc::clone(&status),
        Arc::clone(&metrics),
        Duration::from_secs(cli.metrics_interval_secs),
    );

    tracing::info!(
        pattern = %cli.stream_pattern,
        index = %cli.elastic.elastic_index,
        "Starting bulk sink"
    );
    consumer.run().await;
    reporter.abort();

    let snapshot = metrics.snapshot();
    tracing::info!(
        received = snapshot.received_events,
        processed = snapshot.processed_events,
        dropped = snapshot.dropped_events,
        cycles = snapshot.cycles,
        "Bulk sink finished"
    );

    match status.current() {
        SinkStatus::BackendFailed => Err(anyhow::anyhow!(
            "Backend failed permanently; uncommitted events will be re-delivered on restart"
        )),
        _ => Ok(()),
    }
}

fn spawn_metrics_reporter(
    status: Arc<StatusFsm>,
    metrics: Arc<SinkMetrics>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if status.current().is_terminal() {
                return;
            }
            let snapshot = metrics.snapshot();
            tracing::info!(
                status = ?status.current(),
                received = snapshot.received_events,
                processed = snapshot.processed_events,
                dropped = snapshot.dropped_events,
                cycles = snapshot.cycles,
                last_cycle_micros = snapshot.last_cycle_micros,
                "Pipeline counters"
            );
        }
    })
}
