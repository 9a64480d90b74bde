//! Command-line interface of the `geoload-ingest` binary

use crate::config::{
    IngestConfig, ENV_BATCH_BYTES, ENV_CSV_FILE, ENV_ES_INDEX, ENV_ES_URL,
};
use crate::sink::BulkItemPolicy;
use clap::Parser;
use geoload_common::Result;
use std::path::PathBuf;

/// Load geocoded places from a CSV export into a search index
///
/// Rows are sent in bulk batches. After every committed batch the identifier
/// of its last row is saved next to the input, and a later run skips every
/// row up to and including it.
#[derive(Parser, Debug, Clone)]
#[command(name = "geoload-ingest")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Base URL of the search cluster
    #[arg(long, env = "ES_URL")]
    pub es_url: Option<String>,

    /// Index to load documents into
    #[arg(long, env = "ES_INDEX")]
    pub index: Option<String>,

    /// CSV file to read
    #[arg(long, env = "CSV_FILE")]
    pub csv_file: Option<PathBuf>,

    /// Flush a batch once its payload exceeds this many bytes
    #[arg(long, env = "GEOLOAD_BATCH_BYTES")]
    pub batch_bytes: Option<usize>,

    /// Log rejected bulk items instead of aborting
    #[arg(long)]
    pub lenient_bulk: bool,

    /// Do not save the checkpoint after the final batch
    #[arg(long)]
    pub no_checkpoint_on_drain: bool,

    /// After completion, wait for SIGINT or SIGTERM before exiting
    #[arg(long)]
    pub wait_for_signal: bool,

    /// Delete the checkpoint and start from the first row
    #[arg(long)]
    pub restart: bool,

    /// Read and transform every row without contacting the cluster
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the run configuration. Flags take precedence over the environment.
    pub fn config(&self) -> Result<IngestConfig> {
        let mut config = IngestConfig::from_lookup(|key| self.lookup(key))?;

        if self.lenient_bulk {
            config.bulk_policy = BulkItemPolicy::TopLevelOnly;
        }
        if self.no_checkpoint_on_drain {
            config.checkpoint_on_drain = false;
        }
        if self.wait_for_signal {
            config.wait_for_signal = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let flag = match key {
            ENV_ES_URL => self.es_url.clone(),
            ENV_ES_INDEX => self.index.clone(),
            ENV_CSV_FILE => self.csv_file.as_ref().map(|p| p.display().to_string()),
            ENV_BATCH_BYTES => self.batch_bytes.map(|b| b.to_string()),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    }
}
