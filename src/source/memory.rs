//! In-process journal.
//!
//! Records live in a shared vector. Appending through a `MemoryJournalHandle`
//! wakes readers blocked in `wait`. A position can be marked damaged to make
//! iteration fail there.

use async_trait::async_trait;
use snafu::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::error::{DamagedSnafu, JournalError, NotPositionedSnafu};

use super::{Journal, RawEntry};

struct Shared {
    entries: Mutex<Vec<RawEntry>>,
    damaged: Mutex<Option<usize>>,
    len_tx: watch::Sender<usize>,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, Vec<RawEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn damaged(&self) -> Option<usize> {
        *self.damaged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reader over an in-memory journal.
pub struct MemoryJournal {
    shared: Arc<Shared>,
    len_rx: watch::Receiver<usize>,
    position: Option<usize>,
}

/// Writer side of a `MemoryJournal`.
#[derive(Clone)]
pub struct MemoryJournalHandle {
    shared: Arc<Shared>,
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        let (len_tx, len_rx) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Vec::new()),
                damaged: Mutex::new(None),
                len_tx,
            }),
            len_rx,
            position: None,
        }
    }

    /// Create a journal pre-filled with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = RawEntry>) -> Self {
        let journal = Self::new();
        let handle = journal.handle();
        for entry in entries {
            handle.append(entry);
        }
        journal
    }

    /// Get a handle for appending records.
    pub fn handle(&self) -> MemoryJournalHandle {
        MemoryJournalHandle {
            shared: self.shared.clone(),
        }
    }

    /// Open another independent reader over the same records.
    pub fn reader(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            len_rx: self.shared.len_tx.subscribe(),
            position: None,
        }
    }
}

impl MemoryJournalHandle {
    /// Append a record and wake blocked readers.
    pub fn append(&self, entry: RawEntry) {
        let len = {
            let mut entries = self.shared.entries();
            entries.push(entry);
            entries.len()
        };
        self.shared.len_tx.send_replace(len);
    }

    /// Make reads at `position` fail.
    pub fn damage_at(&self, position: usize) {
        *self
            .shared
            .damaged
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(position);
    }

    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn seek_head(&mut self) -> Result<(), JournalError> {
        self.position = Some(0);
        Ok(())
    }

    async fn seek_cursor(&mut self, cursor: &str) -> Result<(), JournalError> {
        let entries = self.shared.entries();
        // Unknown cursors land past the tail.
        let position = entries
            .iter()
            .position(|e| e.cursor == cursor)
            .unwrap_or(entries.len());
        self.position = Some(position);
        Ok(())
    }

    async fn next_entry(&mut self) -> Result<Option<RawEntry>, JournalError> {
        let position = self.position.context(NotPositionedSnafu)?;
        if self.shared.damaged() == Some(position) {
            return DamagedSnafu { position }.fail();
        }

        let entry = self.shared.entries().get(position).cloned();
        if entry.is_some() {
            self.position = Some(position + 1);
        }
        Ok(entry)
    }

    async fn wait(&mut self) -> Result<(), JournalError> {
        let position = self.position.context(NotPositionedSnafu)?;
        // The sender lives in `shared`, which this reader keeps alive.
        let _ = self.len_rx.wait_for(|len| *len > position).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
