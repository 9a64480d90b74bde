//! Elasticsearch `_bulk` client

use super::{BulkReport, BulkSink};
use async_trait::async_trait;
use geoload_common::{GeoloadError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Client Constants
// ============================================================================

/// Default timeout for requests to the cluster in seconds.
/// Bulk requests on a busy cluster can take a while to be acknowledged.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Content type of a bulk request body
pub const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// Bulk sink backed by an Elasticsearch-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ElasticsearchSink {
    /// Create a client for the cluster at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeoloadError::startup(format!("cannot build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            credentials: None,
        })
    }

    /// Authenticate every request with HTTP basic auth.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, c.password.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl BulkSink for ElasticsearchSink {
    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| GeoloadError::startup(format!("cannot reach {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeoloadError::startup(format!(
                "{url} returned {status}: {body}"
            )));
        }

        debug!(url = %url, status = %status, "Search cluster is reachable");
        Ok(())
    }

    async fn bulk(&self, payload: Vec<u8>) -> Result<BulkReport> {
        let url = self.bulk_url();
        let bytes = payload.len();

        let response = self
            .authorize(self.client.post(&url))
            .header(CONTENT_TYPE, NDJSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| GeoloadError::sink(format!("bulk request to {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GeoloadError::sink(format!("cannot read bulk response: {e}")))?;

        debug!(
            status = %status,
            bytes,
            response = %String::from_utf8_lossy(&body),
            "Bulk request response"
        );

        if !status.is_success() {
            return Err(GeoloadError::sink(format!(
                "bulk request returned {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        Ok(BulkReport::from_body(&body))
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}
