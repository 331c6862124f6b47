//! journalbeat: ships systemd journal entries to Elasticsearch.
//!
//! Entries are read in journal order, normalized into JSON documents, and
//! delivered one at a time. The cursor of each delivered entry is
//! checkpointed to a file, so a restart resumes right after the last
//! acknowledged entry.
//!
//! # Example
//!
//! ```ignore
//! use journalbeat::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     run_pipeline(config).await?;
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod source;

use snafu::prelude::*;
use std::sync::Arc;
use tracing::debug;

pub use config::Config;
pub use pipeline::{Delivery, DeliveryPipeline, PipelineStats};

use error::{MetricsSnafu, PipelineError};
use sink::ElasticsearchSink;
use source::JournalctlJournal;

/// Run the pipeline against the system journal and Elasticsearch.
///
/// Only returns on error.
pub async fn run_pipeline(config: Config) -> Result<PipelineStats, PipelineError> {
    if config.metrics.enabled {
        metrics::init(&config.metrics.address).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    let journal = JournalctlJournal::new(&config.journal);
    let sink = Arc::new(ElasticsearchSink::new(&config.sink));

    let mut pipeline = DeliveryPipeline::open(journal, &config, sink).await?;
    pipeline.run(None).await
}
