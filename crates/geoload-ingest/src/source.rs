//! Forward-only row source over a CSV file
//!
//! The first row is the header; its width fixes the column count every data
//! row must have. Rows are handed out one at a time in file order and any
//! structural problem (wrong width, invalid UTF-8, broken quoting) is reported
//! with the offending line so the file can be fixed and the run repeated.

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use geoload_common::{GeoloadError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// One data row, positionally addressed.
#[derive(Debug, Clone)]
pub struct RawRecord {
    line: u64,
    fields: StringRecord,
}

impl RawRecord {
    /// 1-based line number where the row starts
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Field at `index`, if the row is wide enough
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The row re-joined with commas, for error messages
    pub fn raw(&self) -> String {
        self.fields.iter().collect::<Vec<_>>().join(",")
    }
}

/// Lazy, forward-only sequence of rows from one input.
pub struct RowSource<R: Read = File> {
    reader: csv::Reader<R>,
    record: ByteRecord,
    width: Option<usize>,
    rows_read: u64,
}

impl RowSource<File> {
    /// Open a CSV file for reading.
    ///
    /// Fails if the path does not exist or is not readable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| GeoloadError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened input file");
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> RowSource<R> {
    /// Wrap any reader producing CSV bytes
    pub fn from_reader(reader: R) -> Self {
        // Headers and widths are checked here rather than by the csv crate so
        // a bad row can be reported together with its content.
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        Self {
            reader,
            record: ByteRecord::new(),
            width: None,
            rows_read: 0,
        }
    }

    /// Read the header row. Must be called once, before [`next_row`](Self::next_row).
    pub fn read_header(&mut self) -> Result<Vec<String>> {
        if !self.read_next()? {
            return Err(GeoloadError::EmptyInput);
        }

        let header = self.decode(1)?;
        self.width = Some(header.len());
        Ok(header.iter().map(str::to_string).collect())
    }

    /// Next data row, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<RawRecord>> {
        let Some(width) = self.width else {
            return Err(GeoloadError::MalformedRow {
                line: 0,
                raw: String::new(),
                reason: "header not read".to_string(),
            });
        };

        if !self.read_next()? {
            return Ok(None);
        }

        let line = self
            .record
            .position()
            .map(|p| p.line())
            .unwrap_or(self.rows_read + 1);

        if self.record.len() != width {
            return Err(GeoloadError::MalformedRow {
                line,
                raw: render_raw(&self.record),
                reason: format!("expected {} fields, found {}", width, self.record.len()),
            });
        }

        let fields = self.decode(line)?;
        self.rows_read += 1;
        Ok(Some(RawRecord { line, fields }))
    }

    /// Number of data rows returned so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn read_next(&mut self) -> Result<bool> {
        self.reader
            .read_byte_record(&mut self.record)
            .map_err(|err| {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                match err.into_kind() {
                    csv::ErrorKind::Io(io) => GeoloadError::Io(io),
                    other => GeoloadError::MalformedRow {
                        line,
                        raw: String::new(),
                        reason: format!("{other:?}"),
                    },
                }
            })
    }

    fn decode(&self, line: u64) -> Result<StringRecord> {
        StringRecord::from_byte_record(self.record.clone()).map_err(|err| {
            GeoloadError::MalformedRow {
                line,
                raw: render_raw(&self.record),
                reason: format!("field {} is not valid UTF-8", err.utf8_error().field()),
            }
        })
    }
}

fn render_raw(record: &ByteRecord) -> String {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}
