//! Error types for journalbeat using snafu.
//!
//! Every component returns its own error enum. `PipelineError` aggregates
//! them so that only the top-level driver decides whether the process exits.

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Journal Errors ============

/// Errors raised by a `Journal` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum JournalError {
    /// Failed to start the journal reader process.
    #[snafu(display("Failed to spawn {command}"))]
    Spawn {
        source: std::io::Error,
        command: String,
    },

    /// Failed to read from the journal reader process.
    #[snafu(display("Failed to read journal output"))]
    ReadLine { source: std::io::Error },

    /// A journal record could not be decoded.
    #[snafu(display("Failed to decode journal record"))]
    DecodeRecord { source: serde_json::Error },

    /// A journal record is missing one of its address fields.
    #[snafu(display("Journal record is missing field {field}"))]
    MissingAddressField { field: &'static str },

    /// A timestamp address field is not a decimal integer.
    #[snafu(display("Journal record has invalid {field}: {value}"))]
    InvalidTimestamp { field: &'static str, value: String },

    /// The journal reader exited while the source was still consuming it.
    #[snafu(display("journalctl exited with {status}: {stderr}"))]
    ReaderExited { status: String, stderr: String },

    /// The reader was used before being positioned.
    #[snafu(display("Journal is not positioned; seek before reading"))]
    NotPositioned,

    /// The underlying store reported a damaged position.
    #[snafu(display("Journal is damaged at position {position}"))]
    Damaged { position: usize },
}

// ============ Source Errors ============

/// Errors that can occur while opening or iterating the entry source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The journal could not be opened or positioned.
    #[snafu(display("Failed to open journal"))]
    Open { source: JournalError },

    /// The resume cursor does not name an entry in the journal.
    #[snafu(display("Unknown journal cursor: {cursor}"))]
    UnknownCursor { cursor: String },

    /// Reading the next entry failed.
    #[snafu(display("Failed to read next journal entry"))]
    Iteration { source: JournalError },
}

// ============ Normalize Errors ============

/// Errors that can occur while normalizing an entry.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NormalizeError {
    /// The entry carries no primary message field.
    #[snafu(display("Journal entry {cursor} has no {field} field"))]
    MissingMessage { cursor: String, field: &'static str },

    /// The realtime timestamp cannot be represented as a UTC datetime.
    #[snafu(display("Journal entry {cursor} has out of range timestamp {micros}"))]
    TimestampOutOfRange { cursor: String, micros: u64 },
}

// ============ Checkpoint Errors ============

/// Errors that can occur while persisting or loading the cursor file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    /// The cursor file path could not be made absolute.
    #[snafu(display("Failed to resolve absolute path for cursor file {}", path.display()))]
    ResolvePath {
        source: std::io::Error,
        path: PathBuf,
    },

    /// The temporary cursor file could not be created.
    #[snafu(display("Failed to create temp cursor file in {}", dir.display()))]
    CreateTemp {
        source: std::io::Error,
        dir: PathBuf,
    },

    /// The cursor could not be written to the temporary file.
    #[snafu(display("Failed to write cursor to temp file"))]
    WriteTemp { source: std::io::Error },

    /// The temporary file could not be renamed over the cursor file.
    #[snafu(display("Failed to rename temp cursor file to {}", path.display()))]
    Persist {
        source: std::io::Error,
        path: PathBuf,
    },

    /// The blocking commit task panicked or was cancelled.
    #[snafu(display("Cursor commit task failed"))]
    CommitTask { source: tokio::task::JoinError },

    /// The cursor file exists but could not be read.
    #[snafu(display("Failed to read cursor file {}", path.display()))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Sink Errors ============

/// Errors that can occur while delivering a document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The document could not be serialized.
    #[snafu(display("Failed to serialize document {id}"))]
    Serialize {
        source: serde_json::Error,
        id: String,
    },

    /// The HTTP request failed or returned a non-success status.
    #[snafu(display("Failed to deliver document {id} to {url}"))]
    Request {
        source: ureq::Error,
        id: String,
        url: String,
    },

    /// The blocking delivery task panicked or was cancelled.
    #[snafu(display("Delivery task failed"))]
    DeliveryTask { source: tokio::task::JoinError },

    /// The sink rejected the document.
    #[snafu(display("Sink rejected document {id}: {reason}"))]
    Rejected { id: String, reason: String },
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Elasticsearch URL is empty.
    #[snafu(display("Sink URL cannot be empty"))]
    EmptySinkUrl,

    /// Index name is empty.
    #[snafu(display("Sink index name cannot be empty"))]
    EmptyIndexName,

    /// Cursor file path is empty.
    #[snafu(display("Cursor file path cannot be empty"))]
    EmptyCursorFile,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics address could not be parsed.
    #[snafu(display("Failed to parse metrics address {address}"))]
    AddressParse {
        source: std::net::AddrParseError,
        address: String,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors; every variant is fatal to the process.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Entry source error.
    #[snafu(display("Journal source error"))]
    Source { source: SourceError },

    /// Normalization error.
    #[snafu(display("Normalization error"))]
    Normalize { source: NormalizeError },

    /// Sink delivery error.
    #[snafu(display("Delivery error"))]
    Sink { source: SinkError },

    /// Checkpoint error.
    #[snafu(display("Error updating cursor offset"))]
    Checkpoint { source: CheckpointError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}
