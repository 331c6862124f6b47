//! Delivery pipeline.
//!
//! Connects the entry source, normalizer, sink, and checkpoint store into a
//! single sequential stream. Exactly one entry is in flight at a time:
//!
//! 1. read the next entry (blocks until one exists)
//! 2. normalize it
//! 3. send it and wait for the acknowledgement
//! 4. commit its cursor
//!
//! The cursor for an entry is committed only after the sink acknowledged it,
//! so a crash redelivers at most the one entry in flight and never skips
//! one. Every error is returned to the caller; nothing is retried here.

use chrono::Utc;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::emit;
use crate::error::{CheckpointSnafu, NormalizeSnafu, PipelineError, SinkSnafu, SourceSnafu};
use crate::metrics::events::{DeliveryLag, DocumentDelivered, DocumentSkipped, EntriesRead};
use crate::normalize::{EntryNormalizer, NormalizedDocument};
use crate::sink::Sink;
use crate::source::{EntrySource, Journal};

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub entries_read: u64,
    pub documents_delivered: u64,
    pub documents_skipped: u64,
    pub checkpoints_committed: u64,
}

/// Outcome of processing one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Sent and checkpointed.
    Committed { cursor: String },
    /// Normalized only (dry run).
    Skipped { cursor: String },
}

impl Delivery {
    pub fn cursor(&self) -> &str {
        match self {
            Delivery::Committed { cursor } | Delivery::Skipped { cursor } => cursor,
        }
    }
}

/// The tail → normalize → deliver → checkpoint loop.
pub struct DeliveryPipeline<J: Journal> {
    source: EntrySource<J>,
    normalizer: EntryNormalizer,
    sink: Arc<dyn Sink>,
    checkpoint: CheckpointStore,
    dry_run: bool,
    stats: PipelineStats,
}

impl<J: Journal> DeliveryPipeline<J> {
    /// Load the committed cursor and open `journal` right after it.
    pub async fn open(
        journal: J,
        config: &Config,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, PipelineError> {
        let checkpoint = CheckpointStore::new(&config.cursor_file);
        let cursor = checkpoint.load().context(CheckpointSnafu)?;
        let source = EntrySource::open(journal, &cursor)
            .await
            .context(SourceSnafu)?;

        Ok(Self {
            source,
            normalizer: EntryNormalizer::new(config.normalizer()),
            sink,
            checkpoint,
            dry_run: config.dry_run,
            stats: PipelineStats::default(),
        })
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Process exactly one entry.
    pub async fn deliver_next(&mut self) -> Result<Delivery, PipelineError> {
        let entry = self.source.next().await.context(SourceSnafu)?;
        self.stats.entries_read += 1;
        emit!(EntriesRead { count: 1 });

        let document = self.normalizer.format(&entry).context(NormalizeSnafu)?;

        if self.dry_run {
            debug!(
                id = %document.id,
                body = %serde_json::to_string(&document).unwrap_or_default(),
                "Dry run, document not sent"
            );
            self.stats.documents_skipped += 1;
            emit!(DocumentSkipped);
            return Ok(Delivery::Skipped {
                cursor: entry.cursor,
            });
        }

        let start = Instant::now();
        self.sink.send(&document).await.context(SinkSnafu)?;
        self.stats.documents_delivered += 1;
        emit!(DocumentDelivered {
            duration: start.elapsed()
        });

        self.checkpoint
            .commit_blocking(&entry.cursor)
            .await
            .context(CheckpointSnafu)?;
        self.stats.checkpoints_committed += 1;
        emit!(DeliveryLag {
            seconds: lag_seconds(&document)
        });

        debug!(id = %document.id, cursor = %entry.cursor, "Delivered entry");
        Ok(Delivery::Committed {
            cursor: entry.cursor,
        })
    }

    /// Process entries until `limit` is reached, or forever without a limit.
    ///
    /// Returns early with the first error.
    pub async fn run(&mut self, limit: Option<u64>) -> Result<PipelineStats, PipelineError> {
        info!(
            sink = self.sink.name(),
            dry_run = self.dry_run,
            cursor_file = %self.checkpoint.path().display(),
            "Starting delivery pipeline"
        );

        let mut processed = 0;
        while limit.is_none_or(|limit| processed < limit) {
            let delivery = self.deliver_next().await?;
            trace!(cursor = delivery.cursor(), "Entry done");
            processed += 1;
        }

        info!("Pipeline stopped: {:?}", self.stats);
        Ok(self.stats.clone())
    }
}

fn lag_seconds(document: &NormalizedDocument) -> f64 {
    (Utc::now() - document.timestamp).num_milliseconds() as f64 / 1000.0
}
