//! Build automation tasks for geoload
//!
//! Currently a single task: generating the CLI reference from the clap
//! definitions of `geoload-ingest`.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for geoload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<geoload_ingest::Cli>();

    let content = format!(
        r#"# geoload-ingest CLI Reference

Generated from the CLI source code. Last updated: {}.

## Overview

`geoload-ingest` loads a CSV export of geocoded places into an
Elasticsearch-compatible index through the `_bulk` API. After each accepted
batch the identifier of its last row is written to
`<input stem>_last_id_tracker.csv` next to the input, and a later run
resumes after that row.

## Quick Start

```bash
# Validate every row without contacting the cluster
geoload-ingest --es-url http://localhost:9200 --index places \
  --csv-file data/places.csv --dry-run

# Load, resuming from the checkpoint if there is one
geoload-ingest --es-url http://localhost:9200 --index places \
  --csv-file data/places.csv

# Start over from the first row, settings taken from the environment
geoload-ingest --restart
```

## Commands

{}

## Environment Variables

A `.env` file in the working directory is loaded first if present.

- `ES_URL` - Base URL of the search cluster (required)
- `ES_INDEX` - Target index (required)
- `CSV_FILE` - Input file (required)
- `GEOLOAD_BATCH_BYTES` - Flush threshold in bytes (default: `400`)
- `GEOLOAD_STRICT_BULK` - Abort on rejected bulk items (default: `true`)
- `GEOLOAD_CHECKPOINT_ON_DRAIN` - Save the checkpoint after the final batch (default: `true`)
- `GEOLOAD_WAIT_FOR_SIGNAL` - Wait for SIGINT/SIGTERM after completion (default: `false`)
- `GEOLOAD_ES_TIMEOUT_SECS` - Request timeout (default: `300`)
- `GEOLOAD_ES_USERNAME`, `GEOLOAD_ES_PASSWORD` - Basic auth credentials
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Logging

## Input Layout

| Column | Field |
|---|---|
| 0 | document id |
| 3 | `address` |
| 4 | `city` |
| 5 | `country` |
| 6 | `district` |
| 7 | `division` |
| 8 | `isAutocompleteAddress` (`true` or anything else) |
| 9 | `latlng` as `POINT (<lon> <lat>)` |
| 10 | `placeId` |
| 11 | `plusCode` |
| 12 | `postalCode` |
| 13 | `types`, `;`-separated |

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
