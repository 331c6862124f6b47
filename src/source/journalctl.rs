//! Journal backed by a `journalctl --follow --output=json` child process.
//!
//! Each seek restarts the child at the requested position. The child keeps
//! following the journal, so `next_entry` blocks until a record arrives and
//! never reports "no data".

use async_trait::async_trait;
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::JournalConfig;
use crate::error::{
    DecodeRecordSnafu, InvalidTimestampSnafu, JournalError, MissingAddressFieldSnafu,
    NotPositionedSnafu, ReadLineSnafu, ReaderExitedSnafu, SpawnSnafu,
};

use super::{Journal, RawEntry};

const CURSOR_FIELD: &str = "__CURSOR";
const REALTIME_FIELD: &str = "__REALTIME_TIMESTAMP";
const MONOTONIC_FIELD: &str = "__MONOTONIC_TIMESTAMP";

/// stderr lines kept for the error reported when the reader exits.
const STDERR_TAIL_LINES: usize = 20;

struct ReaderProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
}

/// A journal read through the `journalctl` binary.
pub struct JournalctlJournal {
    command: String,
    directory: Option<PathBuf>,
    reader: Option<ReaderProcess>,
}

impl JournalctlJournal {
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            command: config.command.clone(),
            directory: config.directory.clone(),
            reader: None,
        }
    }

    fn spawn(&mut self, cursor: Option<&str>) -> Result<(), JournalError> {
        // Replacing the reader kills the previous child.
        self.reader = None;

        let mut command = Command::new(&self.command);
        command.args(reader_args(self.directory.as_deref(), cursor));
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context(SpawnSnafu {
            command: self.command.clone(),
        })?;
        let Some(stdout) = child.stdout.take() else {
            return ReaderExitedSnafu {
                status: "no stdout",
                stderr: String::new(),
            }
            .fail();
        };

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain_stderr(pipe)));

        debug!(command = %self.command, cursor = ?cursor, "Spawned journal reader");
        self.reader = Some(ReaderProcess {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr,
        });
        Ok(())
    }
}

#[async_trait]
impl Journal for JournalctlJournal {
    async fn seek_head(&mut self) -> Result<(), JournalError> {
        self.spawn(None)
    }

    async fn seek_cursor(&mut self, cursor: &str) -> Result<(), JournalError> {
        self.spawn(Some(cursor))
    }

    async fn next_entry(&mut self) -> Result<Option<RawEntry>, JournalError> {
        let reader = self.reader.as_mut().context(NotPositionedSnafu)?;

        loop {
            match reader.lines.next_line().await.context(ReadLineSnafu)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return parse_record(&line).map(Some),
                None => break,
            }
        }

        // EOF: the child is gone, which is never expected while following.
        let status = reader.child.wait().await.context(ReadLineSnafu)?;
        let stderr = match reader.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        self.reader = None;

        ReaderExitedSnafu {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        }
        .fail()
    }

    async fn wait(&mut self) -> Result<(), JournalError> {
        // `next_entry` already blocks in follow mode.
        Ok(())
    }

    fn name(&self) -> &str {
        &self.command
    }
}

/// Arguments for a following reader positioned at the head or at `cursor`.
///
/// `--follow` alone shows only the last ten entries, so `--no-tail` is
/// required to see the whole journal from the requested position.
fn reader_args(directory: Option<&Path>, cursor: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--follow", "--no-tail", "--all", "--no-pager", "--output=json"]
        .into_iter()
        .map(OsString::from)
        .collect();
    if let Some(directory) = directory {
        args.push("--directory".into());
        args.push(directory.into());
    }
    if let Some(cursor) = cursor {
        args.push(format!("--cursor={cursor}").into());
    }
    args
}

/// Log every stderr line and return the last few.
async fn drain_stderr(pipe: ChildStderr) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(stderr = %line, "journalctl");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Decode one line of `journalctl --output=json`.
pub fn parse_record(line: &str) -> Result<RawEntry, JournalError> {
    let record: Map<String, Value> = serde_json::from_str(line).context(DecodeRecordSnafu)?;

    let mut cursor = None;
    let mut realtime = None;
    let mut monotonic = None;
    let mut fields = BTreeMap::new();

    for (name, value) in record {
        match name.as_str() {
            CURSOR_FIELD => cursor = field_text(value),
            REALTIME_FIELD => realtime = Some(parse_timestamp(REALTIME_FIELD, value)?),
            MONOTONIC_FIELD => monotonic = Some(parse_timestamp(MONOTONIC_FIELD, value)?),
            n if n.starts_with("__") => {}
            _ => {
                if let Some(text) = field_text(value) {
                    fields.insert(name, text);
                }
            }
        }
    }

    Ok(RawEntry {
        cursor: cursor.context(MissingAddressFieldSnafu {
            field: CURSOR_FIELD,
        })?,
        fields,
        realtime_timestamp: realtime.context(MissingAddressFieldSnafu {
            field: REALTIME_FIELD,
        })?,
        monotonic_timestamp: monotonic.unwrap_or_default(),
    })
}

/// Render a JSON field value the way the journal stores it.
///
/// journalctl emits non-UTF-8 payloads as byte arrays, repeated fields as
/// arrays of values, and oversized fields as `null`.
fn field_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        Value::Array(items) => {
            let bytes: Option<Vec<u8>> = items
                .iter()
                .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect();
            match bytes {
                Some(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                None => items.into_iter().next().and_then(field_text),
            }
        }
        other => Some(other.to_string()),
    }
}

fn parse_timestamp(field: &'static str, value: Value) -> Result<u64, JournalError> {
    let text = field_text(value).unwrap_or_default();
    match text.parse() {
        Ok(micros) => Ok(micros),
        Err(_) => InvalidTimestampSnafu { field, value: text }.fail(),
    }
}
