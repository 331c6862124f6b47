//! Durable storage of the last delivered cursor.
//!
//! # File format
//!
//! The cursor file holds the cursor followed by a single `\n`, nothing else.
//!
//! # Atomicity
//!
//! Commits write a temporary file in the destination's own directory and
//! rename it over the destination, so the rename never crosses filesystems.
//! Readers see either the previous cursor or the new one, never a partial
//! write. A temporary file left by a failed commit is removed on drop.

use snafu::prelude::*;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace};

use crate::emit;
use crate::error::{
    CheckpointError, CommitTaskSnafu, CreateTempSnafu, PersistSnafu, ReadSnafu, ResolvePathSnafu,
    WriteTempSnafu,
};
use crate::metrics::events::CheckpointCommitted;

/// Prefix of temporary files created next to the cursor file.
pub const TEMP_PREFIX: &str = "cursor-";

/// The cursor file of a pipeline.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the committed cursor; empty if nothing was committed yet.
    pub fn load(&self) -> Result<String, CheckpointError> {
        load(&self.path)
    }

    /// Atomically replace the committed cursor.
    pub fn commit(&self, cursor: &str) -> Result<(), CheckpointError> {
        let start = Instant::now();
        commit(&self.path, cursor)?;
        emit!(CheckpointCommitted {
            duration: start.elapsed()
        });
        Ok(())
    }

    /// `commit` on tokio's blocking pool, for use from async code.
    pub async fn commit_blocking(&self, cursor: &str) -> Result<(), CheckpointError> {
        let store = self.clone();
        let cursor = cursor.to_string();
        tokio::task::spawn_blocking(move || store.commit(&cursor))
            .await
            .context(CommitTaskSnafu)?
    }
}

/// Atomically write `cursor` to `path`.
pub fn commit(path: &Path, cursor: &str) -> Result<(), CheckpointError> {
    replace_with(path, |file| file.write_all(format!("{cursor}\n").as_bytes()))?;
    debug!(path = %path.display(), cursor, "Committed cursor");
    Ok(())
}

/// Atomically replace the contents of `path` with what `fill` writes.
fn replace_with<F>(path: &Path, fill: F) -> Result<(), CheckpointError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let path = std::path::absolute(path).context(ResolvePathSnafu { path })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .context(CreateTempSnafu { dir })?;
    trace!(temp = %temp.path().display(), "Created temp cursor file");

    fill(temp.as_file_mut()).context(WriteTempSnafu)?;
    temp.as_file().sync_all().context(WriteTempSnafu)?;

    // Dropping the returned temp file on error removes it.
    temp.persist(&path)
        .map_err(|e| e.error)
        .context(PersistSnafu { path: &path })?;

    // Best effort: make the rename itself durable.
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Read the cursor stored at `path`, trimming trailing whitespace.
///
/// A missing file is not an error: it yields an empty cursor, which makes the
/// source start from the beginning of the journal.
pub fn load(path: &Path) -> Result<String, CheckpointError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.trim_end().to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cursor file, starting from the beginning");
            Ok(String::new())
        }
        Err(e) => Err(e).context(ReadSnafu { path }),
    }
}
