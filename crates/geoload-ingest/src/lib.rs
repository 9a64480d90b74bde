//! Geoload Ingest Library
//!
//! Resumable loading of geocoded place exports into a search index.
//!
//! # Pipeline
//!
//! - **Source**: forward-only CSV rows ([`source`])
//! - **Transform**: fixed column layout to [`PlaceDocument`](geoload_common::types::PlaceDocument) ([`transform`])
//! - **Batch**: size-bounded NDJSON bulk payloads ([`batch`])
//! - **Sink**: Elasticsearch `_bulk` client ([`sink`])
//! - **Checkpoint**: last committed identifier next to the input ([`checkpoint`])
//!
//! # Example
//!
//! ```no_run
//! use geoload_ingest::{ElasticsearchSink, IngestConfig, IngestPipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let sink = ElasticsearchSink::new(&config.es_url, config.timeout)?;
//!     let summary = IngestPipeline::new(config, sink)?.run().await?;
//!     println!("sent {} documents", summary.documents_sent);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod batch;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod transform;

pub use cli::Cli;
pub use config::IngestConfig;
pub use pipeline::{IngestPipeline, IngestSummary, PipelineState};
pub use sink::{BulkSink, ElasticsearchSink};
