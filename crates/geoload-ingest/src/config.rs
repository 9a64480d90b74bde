//! Configuration management
//!
//! Settings come from the process environment (optionally seeded from a
//! `.env` file by the binary) and are resolved once at startup into an
//! [`IngestConfig`] that is passed by value into the pipeline.

use crate::batch::DEFAULT_BATCH_BYTES;
use crate::sink::elasticsearch::DEFAULT_TIMEOUT_SECS;
use crate::sink::BulkItemPolicy;
use geoload_common::{GeoloadError, Result};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Environment Variables
// ============================================================================

pub const ENV_ES_URL: &str = "ES_URL";
pub const ENV_ES_INDEX: &str = "ES_INDEX";
pub const ENV_CSV_FILE: &str = "CSV_FILE";
pub const ENV_BATCH_BYTES: &str = "GEOLOAD_BATCH_BYTES";
pub const ENV_STRICT_BULK: &str = "GEOLOAD_STRICT_BULK";
pub const ENV_CHECKPOINT_ON_DRAIN: &str = "GEOLOAD_CHECKPOINT_ON_DRAIN";
pub const ENV_WAIT_FOR_SIGNAL: &str = "GEOLOAD_WAIT_FOR_SIGNAL";
pub const ENV_TIMEOUT_SECS: &str = "GEOLOAD_ES_TIMEOUT_SECS";
pub const ENV_USERNAME: &str = "GEOLOAD_ES_USERNAME";
pub const ENV_PASSWORD: &str = "GEOLOAD_ES_PASSWORD";

/// Resolved settings for one ingestion run
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Base URL of the search cluster
    pub es_url: String,
    /// Target index name
    pub index: String,
    /// Input CSV file
    pub csv_file: PathBuf,
    /// Flush threshold in bytes
    pub batch_bytes: usize,
    pub bulk_policy: BulkItemPolicy,
    /// Save the checkpoint after the final flush at end of input
    pub checkpoint_on_drain: bool,
    /// Block after completion until SIGINT/SIGTERM
    pub wait_for_signal: bool,
    pub timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl IngestConfig {
    /// Config with defaults for everything but the three required settings
    pub fn new(
        es_url: impl Into<String>,
        index: impl Into<String>,
        csv_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            es_url: es_url.into(),
            index: index.into(),
            csv_file: csv_file.into(),
            batch_bytes: DEFAULT_BATCH_BYTES,
            bulk_policy: BulkItemPolicy::default(),
            checkpoint_on_drain: true,
            wait_for_signal: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            username: None,
            password: None,
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GeoloadError::config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required(ENV_ES_URL)?,
            required(ENV_ES_INDEX)?,
            required(ENV_CSV_FILE)?,
        );

        if let Some(value) = lookup(ENV_BATCH_BYTES) {
            config.batch_bytes = parse_number(ENV_BATCH_BYTES, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT_BULK) {
            config.bulk_policy = if parse_bool(ENV_STRICT_BULK, &value)? {
                BulkItemPolicy::Strict
            } else {
                BulkItemPolicy::TopLevelOnly
            };
        }
        if let Some(value) = lookup(ENV_CHECKPOINT_ON_DRAIN) {
            config.checkpoint_on_drain = parse_bool(ENV_CHECKPOINT_ON_DRAIN, &value)?;
        }
        if let Some(value) = lookup(ENV_WAIT_FOR_SIGNAL) {
            config.wait_for_signal = parse_bool(ENV_WAIT_FOR_SIGNAL, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &value)?);
        }
        config.username = lookup(ENV_USERNAME).filter(|v| !v.is_empty());
        config.password = lookup(ENV_PASSWORD).filter(|v| !v.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.es_url.trim().is_empty() {
            return Err(GeoloadError::config("search cluster URL cannot be empty"));
        }

        if !(self.es_url.starts_with("http://") || self.es_url.starts_with("https://")) {
            return Err(GeoloadError::config(format!(
                "search cluster URL must start with http:// or https://, got '{}'",
                self.es_url
            )));
        }

        if self.index.trim().is_empty() {
            return Err(GeoloadError::config("index name cannot be empty"));
        }

        if self.csv_file.as_os_str().is_empty() {
            return Err(GeoloadError::config("input file path cannot be empty"));
        }

        if self.batch_bytes == 0 {
            return Err(GeoloadError::config("batch threshold must be greater than 0"));
        }

        if self.password.is_some() && self.username.is_none() {
            tracing::warn!("{ENV_PASSWORD} is set without {ENV_USERNAME}; ignoring it");
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            GeoloadError::config(format!(
                "{key} must be a non-negative integer, got '{value}'"
            ))
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(GeoloadError::config(format!(
            "{key} must be true or false, got '{value}'"
        ))),
    }
}
