//! Geoload Ingest - resumable CSV to search index loader

use anyhow::{Context, Result};
use clap::Parser;
use geoload_common::logging::{init_logging, LogConfig, LogLevel};
use geoload_common::GeoloadError;
use geoload_ingest::progress::LoggingProgress;
use geoload_ingest::shutdown::ShutdownSignal;
use geoload_ingest::{Cli, ElasticsearchSink, IngestConfig, IngestPipeline};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("geoload-ingest")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Ignoring invalid logging environment: {e:#}");
            log_config
        }
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");

        if e
            .downcast_ref::<GeoloadError>()
            .is_some_and(GeoloadError::is_structural)
        {
            eprintln!("Fix the input file and run again; committed rows will be skipped.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config().context("Invalid configuration")?;

    // Registered before the run so a signal sent mid-run is only observed afterwards
    let shutdown = ShutdownSignal::install_if(config.wait_for_signal)?;

    let sink = build_sink(&config)?;
    let mut pipeline = IngestPipeline::new(config, sink)?
        .with_listener(LoggingProgress::default())
        .dry_run(cli.dry_run)
        .restart(cli.restart);

    let summary = pipeline.run().await?;

    info!(
        rows_read = summary.rows_read,
        rows_skipped = summary.rows_skipped,
        documents = summary.documents_sent,
        batches = summary.batches_flushed,
        checkpoint = summary.checkpoint.as_deref().unwrap_or("none"),
        elapsed_ms = summary.elapsed().num_milliseconds(),
        dry_run = summary.dry_run,
        "Upload complete"
    );

    if let Some(mut shutdown) = shutdown {
        info!("Waiting for SIGINT or SIGTERM to exit");
        shutdown.recv().await;
    }

    Ok(())
}

fn build_sink(config: &IngestConfig) -> Result<ElasticsearchSink> {
    let sink = ElasticsearchSink::new(&config.es_url, config.timeout)?;
    Ok(match &config.username {
        Some(username) => sink.with_basic_auth(username, config.password.clone()),
        None => sink,
    })
}
