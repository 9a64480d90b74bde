//! Bulk indexing sinks
//!
//! A sink accepts one newline-delimited bulk payload at a time and reports
//! what the service did with each item. The pipeline decides, through
//! [`BulkItemPolicy`], whether item-level failures abort the run.

pub mod elasticsearch;

pub use elasticsearch::ElasticsearchSink;

use async_trait::async_trait;
use geoload_common::{GeoloadError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Failed items listed in a [`GeoloadError::BulkItems`] message
const FAILURE_SAMPLE: usize = 5;

/// Destination for bulk payloads.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Verify the service is reachable before any input is read.
    async fn health_check(&self) -> Result<()>;

    /// Submit one payload. Returns once the service has answered.
    async fn bulk(&self, payload: Vec<u8>) -> Result<BulkReport>;

    fn name(&self) -> &str;
}

/// How item-level failures inside a successful bulk response are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BulkItemPolicy {
    /// Any failed item aborts the run
    #[default]
    Strict,
    /// Only the response status counts; item failures are logged
    TopLevelOnly,
}

/// A rejected bulk item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub status: u16,
    pub reason: String,
}

/// Parsed outcome of one bulk request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub took: u64,
    pub errors: bool,
    pub items: usize,
    pub failures: Vec<ItemFailure>,
    /// Set when a successful response carried a body that could not be parsed
    pub unreadable: Option<String>,
}

impl BulkReport {
    /// Report for a request in which every item succeeded
    pub fn accepted(items: usize) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Parse an Elasticsearch `_bulk` response body.
    pub fn from_response(body: &[u8]) -> Result<Self> {
        let response: BulkResponse = serde_json::from_slice(body)?;

        let failures = response
            .items
            .iter()
            .flat_map(|item| item.values())
            .filter(|result| result.error.is_some() || result.status >= 300)
            .map(|result| ItemFailure {
                id: result.id.clone().unwrap_or_default(),
                status: result.status,
                reason: result
                    .error
                    .as_ref()
                    .map(error_reason)
                    .unwrap_or_else(|| format!("status {}", result.status)),
            })
            .collect();

        Ok(Self {
            took: response.took,
            errors: response.errors,
            items: response.items.len(),
            failures,
            unreadable: None,
        })
    }

    /// Report for a successful response whose body may not be a bulk result.
    ///
    /// A body that fails to parse is kept as [`BulkReport::unreadable`]
    /// instead of failing, so the policy decides what it means.
    pub fn from_body(body: &[u8]) -> Self {
        Self::from_response(body).unwrap_or_else(|e| Self {
            unreadable: Some(e.to_string()),
            ..Self::default()
        })
    }

    pub fn has_failures(&self) -> bool {
        self.errors || !self.failures.is_empty()
    }

    /// Apply `policy`: under [`BulkItemPolicy::Strict`] any failure is an error.
    pub fn enforce(&self, policy: BulkItemPolicy) -> Result<()> {
        if let Some(reason) = &self.unreadable {
            return match policy {
                BulkItemPolicy::Strict => Err(GeoloadError::sink(format!(
                    "cannot parse bulk response: {reason}"
                ))),
                BulkItemPolicy::TopLevelOnly => {
                    tracing::warn!(reason = %reason, "Bulk response body is not a bulk result");
                    Ok(())
                }
            };
        }

        if !self.has_failures() {
            return Ok(());
        }

        match policy {
            BulkItemPolicy::Strict => Err(GeoloadError::BulkItems {
                failed: self.failures.len(),
                sample: self.failure_sample(),
            }),
            BulkItemPolicy::TopLevelOnly => {
                tracing::warn!(
                    failed = self.failures.len(),
                    items = self.items,
                    sample = %self.failure_sample(),
                    "Bulk response reported item failures"
                );
                Ok(())
            }
        }
    }

    fn failure_sample(&self) -> String {
        if self.failures.is_empty() {
            return "errors flag set without failed items".to_string();
        }

        let mut sample = self
            .failures
            .iter()
            .take(FAILURE_SAMPLE)
            .map(|f| format!("{} ({}): {}", f.id, f.status, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        if self.failures.len() > FAILURE_SAMPLE {
            sample.push_str(&format!("; and {} more", self.failures.len() - FAILURE_SAMPLE));
        }
        sample
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BTreeMap<String, ItemResult>>,
}

#[derive(Debug, Deserialize)]
struct ItemResult {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    error: Option<serde_json::Value>,
}

fn error_reason(error: &serde_json::Value) -> String {
    let kind = error.get("type").and_then(|v| v.as_str());
    let reason = error.get("reason").and_then(|v| v.as_str());
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (None, Some(reason)) => reason.to_string(),
        _ => error.to_string(),
    }
}
