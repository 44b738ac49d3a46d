use clap::Parser;

/// Configuration for the elastic sink backend.
#[derive(Debug, Clone, Parser)]
pub struct ElasticConfig {
    /// Elasticsearch endpoint URL
    #[clap(long, default_value = "http://localhost:9200", env = "ELASTIC_ENDPOINT")]
    pub elastic_endpoint: String,

    /// Index to write events into
    #[clap(long)]
    pub elastic_index: String,

    /// Merge the tags of a "properties" container into the document root
    /// instead of nesting them.
    #[clap(long)]
    pub merge_properties_to_root: bool,
}
