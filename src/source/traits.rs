//! The log-store boundary.
//!
//! `Journal` is the minimal set of primitives the entry source needs from a
//! log store: positioning, stepping, and waiting for new data.

use async_trait::async_trait;

use crate::error::JournalError;

use super::RawEntry;

/// A sequential, seekable log store.
#[async_trait]
pub trait Journal: Send {
    /// Position before the first record.
    async fn seek_head(&mut self) -> Result<(), JournalError>;

    /// Position so that the next record returned is the one at `cursor`.
    ///
    /// Stores that cannot find `cursor` may position at the nearest record;
    /// callers verify the cursor of the first record returned.
    async fn seek_cursor(&mut self, cursor: &str) -> Result<(), JournalError>;

    /// Return the next record, or `None` if no record is available yet.
    async fn next_entry(&mut self) -> Result<Option<RawEntry>, JournalError>;

    /// Block until new records may be available.
    async fn wait(&mut self) -> Result<(), JournalError>;

    /// Name of the store, for logging.
    fn name(&self) -> &str;
}
