//! Newline-delimited bulk payload accumulator

use geoload_common::types::{BulkAction, PlaceDocument};
use geoload_common::Result;

/// Default flush threshold in bytes
pub const DEFAULT_BATCH_BYTES: usize = 400;

/// Contents of a batch handed off for sending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainedBatch {
    pub payload: Vec<u8>,
    pub documents: usize,
    /// Identifier of the last document in the payload
    pub last_id: Option<String>,
}

/// Growable bulk request body.
///
/// Each appended record becomes an action line followed by a document line.
/// The batch reports ready once its size is strictly greater than the
/// threshold, so the payload sent may be somewhat larger than it.
#[derive(Debug)]
pub struct BulkBatch {
    buffer: Vec<u8>,
    threshold: usize,
    documents: usize,
    last_id: Option<String>,
}

impl BulkBatch {
    pub fn new(threshold: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(threshold.saturating_mul(2)),
            threshold,
            documents: 0,
            last_id: None,
        }
    }

    /// Append one action/document pair.
    pub fn append(&mut self, action: &BulkAction, document: &PlaceDocument) -> Result<()> {
        serde_json::to_writer(&mut self.buffer, action)?;
        self.buffer.push(b'\n');
        serde_json::to_writer(&mut self.buffer, document)?;
        self.buffer.push(b'\n');

        self.documents += 1;
        self.last_id = Some(action.id().to_string());
        Ok(())
    }

    pub fn should_flush(&self) -> bool {
        self.buffer.len() > self.threshold
    }

    /// Current payload size in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Take the accumulated payload and reset the batch.
    pub fn drain(&mut self) -> DrainedBatch {
        let capacity = self.buffer.capacity();
        DrainedBatch {
            payload: std::mem::replace(&mut self.buffer, Vec::with_capacity(capacity)),
            documents: std::mem::take(&mut self.documents),
            last_id: self.last_id.take(),
        }
    }
}

impl Default for BulkBatch {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_BYTES)
    }
}
