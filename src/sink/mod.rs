//! Document sinks.
//!
//! A sink accepts one normalized document at a time and returns only once
//! the document is acknowledged. Sinks are expected to upsert by document
//! identifier so redelivery after a restart does not create duplicates.

pub mod elasticsearch;

pub use elasticsearch::ElasticsearchSink;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::normalize::NormalizedDocument;

/// Destination for normalized documents.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver a document, returning once it is acknowledged.
    async fn send(&self, document: &NormalizedDocument) -> Result<(), SinkError>;

    /// Name of the sink, for logging.
    fn name(&self) -> &str;
}
