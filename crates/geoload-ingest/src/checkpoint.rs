//! Resume checkpoint persisted next to the input file
//!
//! The tracker file holds the identifier of the last record committed to the
//! index and nothing else. An absent file means no checkpoint.

use geoload_common::{GeoloadError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the tracker for inputs that carry an extension
pub const TRACKER_SUFFIX: &str = "_last_id_tracker.csv";

/// Suffix of the tracker for inputs without an extension
pub const BARE_TRACKER_SUFFIX: &str = "_tracker.csv";

/// Single-value durable store for the last committed record identifier.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store at an explicit tracker path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store whose tracker path is derived from the input file.
    ///
    /// `data/places.csv` maps to `data/places_last_id_tracker.csv`,
    /// `data/places` to `data/places_tracker.csv`.
    pub fn for_input(input: impl AsRef<Path>) -> Self {
        Self::new(tracker_path(input.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last committed identifier, or `None` when no checkpoint exists yet.
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.error(source)),
        }
    }

    /// Replace the stored identifier.
    ///
    /// The new value is written to a sibling temp file and renamed over the
    /// tracker, so a reader sees either the old or the new identifier.
    pub fn save(&self, id: &str) -> Result<()> {
        let temp_path = self.temp_path();

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(id.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };

        write().map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            self.error(source)
        })?;

        debug!(path = %self.path.display(), checkpoint = %id, "Saved checkpoint");
        Ok(())
    }

    /// Remove the tracker so the next run starts from the first row.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.error(source)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, source: std::io::Error) -> GeoloadError {
        GeoloadError::Checkpoint {
            path: self.path.clone(),
            source,
        }
    }
}

fn tracker_path(input: &Path) -> PathBuf {
    match (input.file_stem(), input.extension()) {
        (Some(stem), Some(_)) => {
            let mut name = stem.to_os_string();
            name.push(TRACKER_SUFFIX);
            input.with_file_name(name)
        }
        _ => {
            let mut name = input.as_os_str().to_os_string();
            name.push(BARE_TRACKER_SUFFIX);
            PathBuf::from(name)
        }
    }
}
