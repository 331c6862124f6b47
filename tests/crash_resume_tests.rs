//! Tests that crash the pipeline at each step of a delivery and verify what
//! a restart delivers.
//!
//! Run with: cargo test --test crash_resume_tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use journalbeat::Config;
use journalbeat::error::{PipelineError, RejectedSnafu, SinkError};
use journalbeat::normalize::NormalizedDocument;
use journalbeat::pipeline::DeliveryPipeline;
use journalbeat::sink::Sink;
use journalbeat::source::{MemoryJournal, RawEntry};

/// How a `CrashingSink` behaves once its budget of successful sends is used.
#[derive(Clone, Copy)]
enum CrashMode {
    /// Accept the document, then report failure (crash before commit).
    AfterAck,
    /// Report failure without accepting the document.
    BeforeAck,
}

/// Sink that records accepted messages and fails after `budget` sends.
struct CrashingSink {
    accepted: Mutex<Vec<String>>,
    budget: Mutex<Option<usize>>,
    mode: CrashMode,
}

impl CrashingSink {
    fn new(budget: Option<usize>, mode: CrashMode) -> Arc<Self> {
        Arc::new(Self {
            accepted: Mutex::new(Vec::new()),
            budget: Mutex::new(budget),
            mode,
        })
    }

    fn accepted(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for CrashingSink {
    async fn send(&self, document: &NormalizedDocument) -> Result<(), SinkError> {
        let mut budget = self.budget.lock().unwrap();
        let exhausted = *budget == Some(0);
        if let Some(remaining) = budget.as_mut().filter(|r| **r > 0) {
            *remaining -= 1;
        }

        if exhausted && matches!(self.mode, CrashMode::BeforeAck) {
            return RejectedSnafu {
                id: document.id.as_str(),
                reason: "simulated outage",
            }
            .fail();
        }

        self.accepted.lock().unwrap().push(document.message.clone());

        if exhausted {
            return RejectedSnafu {
                id: document.id.as_str(),
                reason: "simulated crash after acknowledgement",
            }
            .fail();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "crashing"
    }
}

fn entry(i: u64) -> RawEntry {
    RawEntry::new(format!("s=feed;i={i}"), 1_469_826_266_000_000 + i * 1_000)
        .with_field("MESSAGE", format!("message {i}"))
        .with_field("_PID", "1969")
}

fn config(cursor_file: &Path) -> Config {
    let mut config = Config::sample();
    config.cursor_file = cursor_file.to_path_buf();
    config
}

fn messages(range: std::ops::RangeInclusive<u64>) -> Vec<String> {
    range.map(|i| format!("message {i}")).collect()
}

/// A crash after the sink acknowledged entry N+1 but before its cursor was
/// committed redelivers entry N+1, and nothing before it.
#[tokio::test]
async fn test_crash_after_ack_redelivers_only_the_entry_in_flight() {
    let dir = tempfile::TempDir::new().unwrap();
    let cursor_file = dir.path().join("cursor");
    let journal = MemoryJournal::with_entries((1..=5).map(entry));

    // First run: entries 1 and 2 commit, entry 3 is acknowledged, then crash.
    let sink = CrashingSink::new(Some(2), CrashMode::AfterAck);
    let mut pipeline = DeliveryPipeline::open(journal.reader(), &config(&cursor_file), sink.clone())
        .await
        .unwrap();
    let err = pipeline.run(None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Sink { .. }));
    assert_eq!(sink.accepted(), messages(1..=3));
    assert_eq!(
        std::fs::read_to_string(&cursor_file).unwrap(),
        "s=feed;i=2\n"
    );
    drop(pipeline);

    // Restart: entry 3 comes again, then the rest.
    let sink = CrashingSink::new(None, CrashMode::AfterAck);
    let mut pipeline = DeliveryPipeline::open(journal.reader(), &config(&cursor_file), sink.clone())
        .await
        .unwrap();
    pipeline.run(Some(3)).await.unwrap();

    assert_eq!(sink.accepted(), messages(3..=5));
    assert_eq!(
        std::fs::read_to_string(&cursor_file).unwrap(),
        "s=feed;i=5\n"
    );
}

/// A failure before acknowledgement leaves the cursor where it was, and the
/// restart delivers the failed entry first.
#[tokio::test]
async fn test_failure_before_ack_resumes_at_failed_entry() {
    let dir = tempfile::TempDir::new().unwrap();
    let cursor_file = dir.path().join("cursor");
    let journal = MemoryJournal::with_entries((1..=4).map(entry));

    let sink = CrashingSink::new(Some(1), CrashMode::BeforeAck);
    let mut pipeline = DeliveryPipeline::open(journal.reader(), &config(&cursor_file), sink.clone())
        .await
        .unwrap();
    assert!(pipeline.run(None).await.is_err());
    assert_eq!(sink.accepted(), messages(1..=1));
    assert_eq!(
        std::fs::read_to_string(&cursor_file).unwrap(),
        "s=feed;i=1\n"
    );
    drop(pipeline);

    let sink = CrashingSink::new(None, CrashMode::BeforeAck);
    let mut pipeline = DeliveryPipeline::open(journal.reader(), &config(&cursor_file), sink.clone())
        .await
        .unwrap();
    pipeline.run(Some(3)).await.unwrap();
    assert_eq!(sink.accepted(), messages(2..=4));
}

/// The same documents are produced across runs, so an upserting sink ends
/// up with one copy of each entry even after a redelivery.
#[tokio::test]
async fn test_redelivered_document_has_same_id() {
    let dir = tempfile::TempDir::new().unwrap();
    let cursor_file = dir.path().join("cursor");
    let journal = MemoryJournal::with_entries((1..=2).map(entry));

    let first = Arc::new(IdSink::default());
    let mut pipeline = DeliveryPipeline::open(journal.reader(), &config(&cursor_file), first.clone())
        .await
        .unwrap();
    pipeline.run(Some(2)).await.unwrap();
    drop(pipeline);

    // Roll the cursor back by one entry, as if the second commit was lost.
    std::fs::write(&cursor_file, "s=feed;i=1\n").unwrap();

    let second = Arc::new(IdSink::default());
    let mut pipeline =
        DeliveryPipeline::open(journal.reader(), &config(&cursor_file), second.clone())
            .await
            .unwrap();
    pipeline.run(Some(1)).await.unwrap();

    assert_eq!(second.ids.lock().unwrap()[0], first.ids.lock().unwrap()[1]);
}

/// Entries appended while the pipeline is idle are picked up without a
/// restart.
#[tokio::test]
async fn test_live_append_is_delivered() {
    let dir = tempfile::TempDir::new().unwrap();
    let cursor_file = dir.path().join("cursor");
    let journal = MemoryJournal::with_entries((1..=1).map(entry));
    let handle = journal.handle();

    let sink = CrashingSink::new(None, CrashMode::AfterAck);
    let mut pipeline = DeliveryPipeline::open(journal, &config(&cursor_file), sink.clone())
        .await
        .unwrap();

    let task = tokio::spawn(async move { pipeline.run(Some(3)).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.append(entry(2));
    handle.append(entry(3));

    let stats = tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.documents_delivered, 3);
    assert_eq!(sink.accepted(), messages(1..=3));
}

/// A committed cursor the journal no longer knows about stops the pipeline
/// instead of silently starting over.
#[tokio::test]
async fn test_vanished_cursor_is_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    let cursor_file = dir.path().join("cursor");
    std::fs::write(&cursor_file, "s=rotated;i=99\n").unwrap();
    let journal = MemoryJournal::with_entries((1..=2).map(entry));

    let sink = CrashingSink::new(None, CrashMode::AfterAck);
    let result = DeliveryPipeline::open(journal, &config(&cursor_file), sink.clone()).await;

    assert!(matches!(result, Err(PipelineError::Source { .. })));
    assert!(sink.accepted().is_empty());
}

#[derive(Default)]
struct IdSink {
    ids: Mutex<Vec<String>>,
}

#[async_trait]
impl Sink for IdSink {
    async fn send(&self, document: &NormalizedDocument) -> Result<(), SinkError> {
        self.ids.lock().unwrap().push(document.id.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "ids"
    }
}
