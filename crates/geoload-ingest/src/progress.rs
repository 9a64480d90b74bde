//! Progress reporting hooks for the ingestion pipeline

use tracing::info;

/// Milestones of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The checkpoint row was found; `skipped` rows were discarded, including it.
    Resumed { checkpoint: String, skipped: u64 },
    /// A batch was accepted by the sink.
    BatchCommitted {
        batch: u64,
        documents: usize,
        bytes: usize,
        last_id: String,
    },
    /// The checkpoint now points at `id`.
    CheckpointSaved { id: String },
    /// Input exhausted and every batch committed.
    Completed { documents: u64, batches: u64 },
}

/// Receives [`ProgressEvent`]s as the pipeline makes progress.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressListener for NoOpProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Logs each event at info level.
///
/// Batch commits are logged every `every` batches to keep large runs readable.
#[derive(Debug, Clone, Copy)]
pub struct LoggingProgress {
    every: u64,
}

impl LoggingProgress {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for LoggingProgress {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ProgressListener for LoggingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Resumed {
                checkpoint,
                skipped,
            } => {
                info!(checkpoint = %checkpoint, skipped, "Resumed after checkpoint");
            }
            ProgressEvent::BatchCommitted {
                batch,
                documents,
                bytes,
                last_id,
            } => {
                if batch % self.every == 0 {
                    info!(batch, documents, bytes, last_id = %last_id, "Batch committed");
                }
            }
            ProgressEvent::CheckpointSaved { .. } => {}
            ProgressEvent::Completed { documents, batches } => {
                info!(documents, batches, "All batches committed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_progress() {
        NoOpProgress.on_event(&ProgressEvent::CheckpointSaved {
            id: "a".to_string(),
        });
    }

    #[test]
    fn test_logging_progress_interval_is_at_least_one() {
        let listener = LoggingProgress::new(0);
        assert_eq!(listener.every, 1);
        listener.on_event(&ProgressEvent::BatchCommitted {
            batch: 3,
            documents: 2,
            bytes: 512,
            last_id: "b".to_string(),
        });
    }
}
