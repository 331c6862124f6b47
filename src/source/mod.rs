//! Sequential, resumable reading of journal entries.
//!
//! `EntrySource` wraps a `Journal` and hides its "no data yet" state: `next`
//! only ever returns an entry or a fatal error. Entries come out in exactly
//! the journal's order; a damaged position is an error, never skipped.

pub mod entry;
pub mod journalctl;
pub mod memory;
pub mod traits;

pub use entry::RawEntry;
pub use journalctl::JournalctlJournal;
pub use memory::{MemoryJournal, MemoryJournalHandle};
pub use traits::Journal;

use snafu::prelude::*;
use tracing::{debug, info, trace};

use crate::error::{IterationSnafu, OpenSnafu, SourceError, UnknownCursorSnafu};

/// Reads entries from a journal, starting at the head or after a cursor.
pub struct EntrySource<J: Journal> {
    journal: J,
}

impl<J: Journal> EntrySource<J> {
    /// Position `journal` for reading.
    ///
    /// An empty `resume_cursor` starts at the first entry. Otherwise the entry
    /// at `resume_cursor` is consumed and reading continues with the one after
    /// it; a cursor that does not name an entry is rejected.
    pub async fn open(mut journal: J, resume_cursor: &str) -> Result<Self, SourceError> {
        if resume_cursor.is_empty() {
            journal.seek_head().await.context(OpenSnafu)?;
            info!(journal = journal.name(), "Reading journal from the beginning");
            return Ok(Self { journal });
        }

        journal
            .seek_cursor(resume_cursor)
            .await
            .context(OpenSnafu)?;

        let anchor = journal.next_entry().await.context(OpenSnafu)?;
        match anchor {
            Some(entry) if entry.cursor == resume_cursor => {
                info!(
                    journal = journal.name(),
                    cursor = resume_cursor,
                    "Resuming journal after cursor"
                );
                Ok(Self { journal })
            }
            Some(entry) => {
                debug!(
                    expected = resume_cursor,
                    found = %entry.cursor,
                    "Journal positioned at a different entry"
                );
                UnknownCursorSnafu {
                    cursor: resume_cursor,
                }
                .fail()
            }
            None => UnknownCursorSnafu {
                cursor: resume_cursor,
            }
            .fail(),
        }
    }

    /// Return the next entry, waiting as long as it takes for one to appear.
    pub async fn next(&mut self) -> Result<RawEntry, SourceError> {
        loop {
            if let Some(entry) = self.journal.next_entry().await.context(IterationSnafu)? {
                trace!(cursor = %entry.cursor, "Read journal entry");
                return Ok(entry);
            }
            self.journal.wait().await.context(IterationSnafu)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JournalError;
    use std::time::Duration;

    fn entry(i: u64) -> RawEntry {
        RawEntry::new(format!("i={i}"), i).with_field("MESSAGE", format!("message {i}"))
    }

    #[tokio::test]
    async fn test_open_empty_cursor_starts_at_head() {
        let journal = MemoryJournal::with_entries((1..=3).map(entry));
        let mut source = EntrySource::open(journal, "").await.unwrap();

        assert_eq!(source.next().await.unwrap().cursor, "i=1");
        assert_eq!(source.next().await.unwrap().cursor, "i=2");
        assert_eq!(source.next().await.unwrap().cursor, "i=3");
    }

    #[tokio::test]
    async fn test_open_resumes_after_cursor() {
        let journal = MemoryJournal::with_entries((1..=3).map(entry));
        let mut source = EntrySource::open(journal, "i=2").await.unwrap();

        assert_eq!(source.next().await.unwrap().cursor, "i=3");
    }

    #[tokio::test]
    async fn test_open_unknown_cursor_fails() {
        let journal = MemoryJournal::with_entries((1..=3).map(entry));
        let result = EntrySource::open(journal, "nosuchcursor").await;

        assert!(matches!(
            result,
            Err(SourceError::UnknownCursor { cursor }) if cursor == "nosuchcursor"
        ));
    }

    #[tokio::test]
    async fn test_open_damaged_anchor_fails() {
        let journal = MemoryJournal::with_entries((1..=3).map(entry));
        journal.handle().damage_at(1);

        let result = EntrySource::open(journal, "i=2").await;
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[tokio::test]
    async fn test_next_blocks_until_append() {
        let journal = MemoryJournal::with_entries([entry(1)]);
        let handle = journal.handle();
        let mut source = EntrySource::open(journal, "i=1").await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), source.next()).await;
        assert!(pending.is_err(), "next should still be waiting");

        handle.append(entry(2));
        let next = tokio::time::timeout(Duration::from_secs(5), source.next())
            .await
            .expect("next should return after append")
            .unwrap();
        assert_eq!(next.cursor, "i=2");
    }

    #[tokio::test]
    async fn test_iteration_error_is_not_skipped() {
        let journal = MemoryJournal::with_entries((1..=3).map(entry));
        journal.handle().damage_at(1);
        let mut source = EntrySource::open(journal, "").await.unwrap();

        assert_eq!(source.next().await.unwrap().cursor, "i=1");
        for _ in 0..2 {
            let err = source.next().await.unwrap_err();
            assert!(matches!(
                err,
                SourceError::Iteration {
                    source: JournalError::Damaged { position: 1 }
                }
            ));
        }
    }
}
