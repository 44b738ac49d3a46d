//! HTTP transport for the elastic bulk API.

use std::time::Duration;

use async_trait::async_trait;

use crate::sender::{BulkTransport, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts `_bulk` bodies to an Elasticsearch endpoint.
pub struct HttpBulkTransport {
    client: reqwest::Client,
    bulk_url: String,
}

impl HttpBulkTransport {
    pub fn new(endpoint: &str, index: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        let bulk_url = format!("{}/{}/_bulk", endpoint.trim_end_matches('/'), index);
        Ok(Self { client, bulk_url })
    }
}

#[async_trait]
impl BulkTransport for HttpBulkTransport {
    async fn execute(&self, body: Vec<u8>) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(&self.bulk_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}
