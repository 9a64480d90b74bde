//! Resumable batch ingestion driver
//!
//! One run reads the input front to back exactly once:
//!
//! 1. **Idle** - check the sink is reachable, drop the checkpoint on restart,
//!    and load it.
//! 2. **Resuming** - with a checkpoint, discard rows up to and including the
//!    one whose identifier matches it.
//! 3. **Streaming** - transform each row and append it to the batch.
//! 4. **Flushing** - when the batch is over its threshold, send it and move
//!    the checkpoint to its last identifier.
//! 5. **Draining** - at end of input, send whatever is left.
//!
//! Any error moves the pipeline to **Aborted** and is returned unchanged. The
//! checkpoint is only ever advanced after the sink has accepted a batch, so a
//! rerun after an abort resends at most the batch that was in flight.

use crate::batch::BulkBatch;
use crate::checkpoint::CheckpointStore;
use crate::config::IngestConfig;
use crate::progress::{NoOpProgress, ProgressEvent, ProgressListener};
use crate::sink::BulkSink;
use crate::source::RowSource;
use crate::transform::{record_id, RecordTransformer, TransformedRecord};
use chrono::{DateTime, Utc};
use geoload_common::types::BulkAction;
use geoload_common::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// Where the pipeline is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resuming,
    Streaming,
    Flushing,
    Draining,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Resuming => "resuming",
            PipelineState::Streaming => "streaming",
            PipelineState::Flushing => "flushing",
            PipelineState::Draining => "draining",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    /// Data rows read from the input, skipped ones included
    pub rows_read: u64,
    /// Rows discarded while resuming
    pub rows_skipped: u64,
    pub documents_sent: u64,
    pub batches_flushed: u64,
    /// Checkpoint at the end of the run
    pub checkpoint: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestSummary {
    fn started(checkpoint: Option<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            rows_read: 0,
            rows_skipped: 0,
            documents_sent: 0,
            batches_flushed: 0,
            checkpoint,
            dry_run,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives one ingestion run from the input file into a [`BulkSink`].
pub struct IngestPipeline<S: BulkSink> {
    config: IngestConfig,
    sink: S,
    checkpoint: CheckpointStore,
    transformer: RecordTransformer,
    listener: Box<dyn ProgressListener>,
    state: PipelineState,
    dry_run: bool,
    restart: bool,
}

impl<S: BulkSink> IngestPipeline<S> {
    pub fn new(config: IngestConfig, sink: S) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            checkpoint: CheckpointStore::for_input(&config.csv_file),
            transformer: RecordTransformer::new()?,
            listener: Box::new(NoOpProgress),
            state: PipelineState::Idle,
            dry_run: false,
            restart: false,
            config,
            sink,
        })
    }

    /// Report progress to `listener`
    pub fn with_listener(mut self, listener: impl ProgressListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Keep the checkpoint somewhere other than next to the input
    pub fn with_checkpoint_store(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = store;
        self
    }

    /// Read and transform every row, but neither send nor checkpoint anything.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Discard the checkpoint once the sink is known to be reachable, and
    /// start from the first row. Ignored in a dry run.
    pub fn restart(mut self, enabled: bool) -> Self {
        self.restart = enabled;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Run the pipeline to completion.
    pub async fn run(&mut self) -> Result<IngestSummary> {
        let result = self.execute().await;
        if let Err(e) = &result {
            debug!(error = %e, "Ingestion aborted");
            self.transition(PipelineState::Aborted);
        }
        result
    }

    async fn execute(&mut self) -> Result<IngestSummary> {
        self.transition(PipelineState::Idle);

        let resume_from = if self.dry_run {
            None
        } else {
            self.sink.health_check().await?;
            if self.restart {
                self.checkpoint.clear()?;
                info!(path = %self.checkpoint.path().display(), "Cleared checkpoint");
            }
            self.checkpoint.load()?
        };
        let mut summary = IngestSummary::started(resume_from.clone(), self.dry_run);

        info!(
            input = %self.config.csv_file.display(),
            index = %self.config.index,
            sink = self.sink.name(),
            checkpoint = resume_from.as_deref().unwrap_or("none"),
            dry_run = self.dry_run,
            "Starting ingestion"
        );

        let mut source = RowSource::open(&self.config.csv_file)?;
        let header = source.read_header()?;
        debug!(columns = header.len(), "Read header");

        if let Some(checkpoint) = resume_from {
            self.transition(PipelineState::Resuming);

            match self.skip_committed(&mut source, &checkpoint)? {
                Some(skipped) => {
                    summary.rows_skipped = skipped;
                    self.listener.on_event(&ProgressEvent::Resumed {
                        checkpoint,
                        skipped,
                    });
                }
                None => {
                    warn!(
                        checkpoint = %checkpoint,
                        rows = source.rows_read(),
                        "Checkpoint identifier not found in input; nothing to send"
                    );
                    summary.rows_read = source.rows_read();
                    summary.rows_skipped = source.rows_read();
                    return Ok(self.finish(summary));
                }
            }
        }

        self.transition(PipelineState::Streaming);
        let mut batch = BulkBatch::new(self.config.batch_bytes);

        while let Some(record) = source.next_row()? {
            let TransformedRecord { id, document } = self.transformer.transform(&record)?;
            batch.append(&BulkAction::upsert(&self.config.index, id), &document)?;

            if batch.should_flush() {
                self.transition(PipelineState::Flushing);
                self.flush(&mut batch, &mut summary, true).await?;
                self.transition(PipelineState::Streaming);
            }
        }
        summary.rows_read = source.rows_read();

        if !batch.is_empty() {
            self.transition(PipelineState::Draining);
            let save = self.config.checkpoint_on_drain;
            self.flush(&mut batch, &mut summary, save).await?;
        }

        self.listener.on_event(&ProgressEvent::Completed {
            documents: summary.documents_sent,
            batches: summary.batches_flushed,
        });
        Ok(self.finish(summary))
    }

    /// Discard rows up to and including `checkpoint`.
    ///
    /// Returns the number of rows discarded, or `None` if the input ended first.
    fn skip_committed(&self, source: &mut RowSource, checkpoint: &str) -> Result<Option<u64>> {
        while let Some(record) = source.next_row()? {
            if record_id(&record) == checkpoint {
                debug!(line = record.line(), id = %checkpoint, "Found checkpoint row");
                return Ok(Some(source.rows_read()));
            }
        }
        Ok(None)
    }

    async fn flush(
        &mut self,
        batch: &mut BulkBatch,
        summary: &mut IngestSummary,
        save_checkpoint: bool,
    ) -> Result<()> {
        let drained = batch.drain();
        let Some(last_id) = drained.last_id else {
            return Ok(());
        };
        let bytes = drained.payload.len();

        if self.dry_run {
            debug!(
                documents = drained.documents,
                bytes,
                last_id = %last_id,
                "Dry run: batch not sent"
            );
            return Ok(());
        }

        debug!(documents = drained.documents, bytes, last_id = %last_id, "Sending batch");
        let report = self.sink.bulk(drained.payload).await?;
        report.enforce(self.config.bulk_policy)?;

        summary.documents_sent += drained.documents as u64;
        summary.batches_flushed += 1;
        self.listener.on_event(&ProgressEvent::BatchCommitted {
            batch: summary.batches_flushed,
            documents: drained.documents,
            bytes,
            last_id: last_id.clone(),
        });

        if save_checkpoint {
            self.checkpoint.save(&last_id)?;
            self.listener.on_event(&ProgressEvent::CheckpointSaved { id: last_id.clone() });
            summary.checkpoint = Some(last_id);
        }

        Ok(())
    }

    fn finish(&mut self, mut summary: IngestSummary) -> IngestSummary {
        summary.finished_at = Utc::now();
        self.transition(PipelineState::Done);
        summary
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Pipeline state change");
        }
        self.state = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sink::{BulkItemPolicy, BulkReport, ItemFailure};
    use async_trait::async_trait;
    use geoload_common::GeoloadError;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const HEADER: &str = "id,c1,c2,address,city,country,district,division,is_autocomplete,latlng,place_id,plus_code,postal_code,types";

    fn row(id: &str, geometry: &str) -> String {
        format!("{id},x,y,1 Main St,Lund,SE,Centrum,Skane,true,{geometry},p-{id},9F00+00,22100,premise")
    }

    fn write_input(dir: &TempDir, rows: &[String]) -> PathBuf {
        let path = dir.path().join("places.csv");
        let mut text = format!("{HEADER}\n");
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    fn rows(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| row(id, "POINT (13.19 55.70)")).collect()
    }

    #[derive(Default)]
    struct Recorded {
        health_checks: usize,
        payloads: Vec<String>,
    }

    /// Sink that records payloads and answers from a script.
    #[derive(Clone, Default)]
    struct MockSink {
        recorded: Arc<Mutex<Recorded>>,
        unhealthy: bool,
        fail_on_call: Option<usize>,
        item_failure_on_call: Option<usize>,
    }

    impl MockSink {
        fn payloads(&self) -> Vec<String> {
            self.recorded.lock().unwrap().payloads.clone()
        }

        fn documents_per_call(&self) -> Vec<usize> {
            self.payloads().iter().map(|p| p.lines().count() / 2).collect()
        }
    }

    #[async_trait]
    impl BulkSink for MockSink {
        async fn health_check(&self) -> Result<()> {
            self.recorded.lock().unwrap().health_checks += 1;
            if self.unhealthy {
                return Err(GeoloadError::startup("cluster unreachable"));
            }
            Ok(())
        }

        async fn bulk(&self, payload: Vec<u8>) -> Result<BulkReport> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.payloads.push(String::from_utf8(payload).unwrap());
            let call = recorded.payloads.len();
            let items = recorded.payloads[call - 1].lines().count() / 2;

            if self.fail_on_call == Some(call) {
                return Err(GeoloadError::sink("bulk request returned 500"));
            }
            if self.item_failure_on_call == Some(call) {
                return Ok(BulkReport {
                    errors: true,
                    items,
                    failures: vec![ItemFailure {
                        id: "x".to_string(),
                        status: 400,
                        reason: "mapper_parsing_exception".to_string(),
                    }],
                    ..BulkReport::default()
                });
            }
            Ok(BulkReport::accepted(items))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Clone, Default)]
    struct RecordingListener(Arc<Mutex<Vec<ProgressEvent>>>);

    impl ProgressListener for RecordingListener {
        fn on_event(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn config(input: &Path, batch_bytes: usize) -> IngestConfig {
        let mut config = IngestConfig::new("http://localhost:9200", "places", input);
        config.batch_bytes = batch_bytes;
        config
    }

    /// Payload size of a single transformed row
    fn pair_len(input_row: &str) -> usize {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &[input_row.to_string()]);
        let mut source = RowSource::open(&path).unwrap();
        source.read_header().unwrap();
        let record = source.next_row().unwrap().unwrap();
        let out = RecordTransformer::new().unwrap().transform(&record).unwrap();

        let mut batch = BulkBatch::new(usize::MAX);
        batch
            .append(&BulkAction::upsert("places", out.id), &out.document)
            .unwrap();
        batch.len()
    }

    #[tokio::test]
    async fn test_three_rows_flush_after_second() {
        let dir = TempDir::new().unwrap();
        let input = rows(&["r1", "r2", "r3"]);
        let path = write_input(&dir, &input);

        let mut config = config(&path, pair_len(&input[0]));
        config.checkpoint_on_drain = false;

        let sink = MockSink::default();
        let listener = RecordingListener::default();
        let mut pipeline = IngestPipeline::new(config, sink.clone())
            .unwrap()
            .with_listener(listener.clone());

        let summary = pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(sink.documents_per_call(), vec![2, 1]);
        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.documents_sent, 3);
        assert_eq!(summary.batches_flushed, 2);
        assert_eq!(summary.checkpoint.as_deref(), Some("r2"));
        assert_eq!(
            pipeline.checkpoint_store().load().unwrap().as_deref(),
            Some("r2")
        );

        let saves: Vec<_> = listener
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::CheckpointSaved { .. }))
            .cloned()
            .collect();
        assert_eq!(
            saves,
            vec![ProgressEvent::CheckpointSaved {
                id: "r2".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_drain_saves_checkpoint_by_default() {
        let dir = TempDir::new().unwrap();
        let input = rows(&["r1", "r2", "r3"]);
        let path = write_input(&dir, &input);

        let sink = MockSink::default();
        let mut pipeline =
            IngestPipeline::new(config(&path, pair_len(&input[0])), sink.clone()).unwrap();
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.checkpoint.as_deref(), Some("r3"));
        assert_eq!(
            pipeline.checkpoint_store().load().unwrap().as_deref(),
            Some("r3")
        );
    }

    #[tokio::test]
    async fn test_payload_carries_index_and_ids() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1"]));

        let sink = MockSink::default();
        IngestPipeline::new(config(&path, 10_000), sink.clone())
            .unwrap()
            .run()
            .await
            .unwrap();

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 1);
        let first_line = payloads[0].lines().next().unwrap();
        assert_eq!(first_line, r#"{"index":{"_index":"places","_id":"r1"}}"#);
    }

    #[tokio::test]
    async fn test_resume_skips_committed_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2", "r3", "r4"]));
        CheckpointStore::for_input(&path).save("r2").unwrap();

        let sink = MockSink::default();
        let listener = RecordingListener::default();
        let summary = IngestPipeline::new(config(&path, 10_000), sink.clone())
            .unwrap()
            .with_listener(listener.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.documents_sent, 2);
        let payload = &sink.payloads()[0];
        assert!(payload.contains(r#""_id":"r3""#));
        assert!(payload.contains(r#""_id":"r4""#));
        assert!(!payload.contains(r#""_id":"r2""#));

        assert!(listener.0.lock().unwrap().contains(&ProgressEvent::Resumed {
            checkpoint: "r2".to_string(),
            skipped: 2,
        }));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2", "r3"]));

        let first = MockSink::default();
        IngestPipeline::new(config(&path, 10), first.clone())
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(first.payloads().len(), 3);

        let second = MockSink::default();
        let summary = IngestPipeline::new(config(&path, 10), second.clone())
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(second.payloads().is_empty());
        assert_eq!(summary.rows_skipped, 3);
        assert_eq!(summary.documents_sent, 0);
    }

    #[tokio::test]
    async fn test_rows_before_checkpoint_are_not_transformed() {
        let dir = TempDir::new().unwrap();
        let path = write_input(
            &dir,
            &[row("r1", "INVALID"), row("r2", "POINT (1 2)"), row("r3", "POINT (3 4)")],
        );
        CheckpointStore::for_input(&path).save("r2").unwrap();

        let sink = MockSink::default();
        let summary = IngestPipeline::new(config(&path, 10_000), sink.clone())
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.documents_sent, 1);
    }

    #[tokio::test]
    async fn test_unknown_checkpoint_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2"]));
        CheckpointStore::for_input(&path).save("gone").unwrap();

        let sink = MockSink::default();
        let mut pipeline = IngestPipeline::new(config(&path, 10), sink.clone()).unwrap();
        let summary = pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Done);
        assert!(sink.payloads().is_empty());
        assert_eq!(summary.checkpoint.as_deref(), Some("gone"));
    }

    #[tokio::test]
    async fn test_bad_geometry_aborts_without_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &[row("r1", "INVALID")]);

        let sink = MockSink::default();
        let mut pipeline = IngestPipeline::new(config(&path, 10), sink.clone()).unwrap();
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, GeoloadError::Parse { .. }));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert!(sink.payloads().is_empty());
        assert_eq!(pipeline.checkpoint_store().load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2", "r3"]));

        let sink = MockSink {
            fail_on_call: Some(2),
            ..MockSink::default()
        };
        let mut pipeline = IngestPipeline::new(config(&path, 10), sink.clone()).unwrap();
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, GeoloadError::Sink(_)));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert_eq!(
            pipeline.checkpoint_store().load().unwrap().as_deref(),
            Some("r1")
        );
    }

    #[tokio::test]
    async fn test_item_failures_respect_policy() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2"]));

        let strict = MockSink {
            item_failure_on_call: Some(2),
            ..MockSink::default()
        };
        let mut pipeline = IngestPipeline::new(config(&path, 10), strict).unwrap();
        assert!(matches!(
            pipeline.run().await,
            Err(GeoloadError::BulkItems { failed: 1, .. })
        ));
        assert_eq!(
            pipeline.checkpoint_store().load().unwrap().as_deref(),
            Some("r1")
        );

        pipeline.checkpoint_store().clear().unwrap();
        let mut lenient_config = config(&path, 10);
        lenient_config.bulk_policy = BulkItemPolicy::TopLevelOnly;
        let lenient = MockSink {
            item_failure_on_call: Some(2),
            ..MockSink::default()
        };
        let summary = IngestPipeline::new(lenient_config, lenient)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.checkpoint.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_health_check_failure_aborts_before_reading() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.csv");

        let sink = MockSink {
            unhealthy: true,
            ..MockSink::default()
        };
        let mut pipeline = IngestPipeline::new(config(&path, 10), sink.clone()).unwrap();
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, GeoloadError::Startup(_)));
        assert_eq!(sink.recorded.lock().unwrap().health_checks, 1);
    }

    #[tokio::test]
    async fn test_restart_clears_checkpoint_only_after_health_check() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2"]));
        let store = CheckpointStore::for_input(&path);
        store.save("r2").unwrap();

        let down = MockSink {
            unhealthy: true,
            ..MockSink::default()
        };
        let mut pipeline = IngestPipeline::new(config(&path, 10_000), down)
            .unwrap()
            .restart(true);
        assert!(matches!(pipeline.run().await, Err(GeoloadError::Startup(_))));
        assert_eq!(store.load().unwrap().as_deref(), Some("r2"));

        let up = MockSink::default();
        let summary = IngestPipeline::new(config(&path, 10_000), up.clone())
            .unwrap()
            .restart(true)
            .run()
            .await
            .unwrap();
        assert_eq!(up.documents_per_call(), vec![2]);
        assert_eq!(summary.rows_skipped, 0);
        assert_eq!(store.load().unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_dry_run_validates_without_sending() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, &rows(&["r1", "r2", "r3"]));
        CheckpointStore::for_input(&path).save("r1").unwrap();

        let sink = MockSink::default();
        let summary = IngestPipeline::new(config(&path, 10), sink.clone())
            .unwrap()
            .dry_run(true)
            .restart(true)
            .run()
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.documents_sent, 0);
        assert!(sink.payloads().is_empty());
        assert_eq!(sink.recorded.lock().unwrap().health_checks, 0);
        assert_eq!(
            CheckpointStore::for_input(&path).load().unwrap().as_deref(),
            Some("r1")
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places.csv");
        std::fs::write(&path, "").unwrap();

        let mut pipeline = IngestPipeline::new(config(&path, 10), MockSink::default()).unwrap();
        assert!(matches!(pipeline.run().await, Err(GeoloadError::EmptyInput)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = IngestConfig::new("http://localhost:9200", "places", "places.csv");
        config.batch_bytes = 0;
        assert!(IngestPipeline::new(config, MockSink::default()).is_err());
    }
}
