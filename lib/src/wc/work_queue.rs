// Copyright 2025 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The work queue (C2b): an ordered, idempotent, crash-safe log of pending
//! filesystem operations.
//!
//! Each entry is appended to an on-disk log before it takes effect, and
//! removed from the log only after the operation has completed. A process
//! that crashes mid-run leaves a log whose still-present entries describe
//! exactly the work that remains; re-running [`WorkQueue::run`] on the same
//! log produces the same end state whether or not earlier entries already
//! took effect, because every operation is written to tolerate being applied
//! to a filesystem that's already in the post-operation state.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use crate::error::RvcError;
use crate::file_util;

/// One unit of work. Each variant names its own closed set of side effects;
/// there is no general "run a command" escape hatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItem {
    /// Installs `source` (a pristine-store path) at `dest`, translating on
    /// the way out.
    FileInstall { source: PathBuf, dest: PathBuf },
    FileRemove { path: PathBuf },
    FileMove { source: PathBuf, dest: PathBuf },
    /// Copies `source` to `dest`, applying the translator rather than a raw
    /// byte copy.
    CopyTranslated { source: PathBuf, dest: PathBuf },
    /// Synchronizes `path`'s executable/hidden/read-only bits from recorded
    /// metadata.
    SyncFileFlags { path: PathBuf },
    /// Installs a `.prej` property-conflict description at `path`.
    PrejInstall { path: PathBuf, content: Vec<u8> },
    /// Re-reads `path`'s fingerprint into the entry database.
    RecordFileInfo { path: PathBuf },
    /// Removes the pristine copy tracked for `path`.
    BaseRemove { path: PathBuf },
    /// Restores `path` from its pristine copy, discarding local edits.
    Revert { path: PathBuf },
    SetTextConflictMarkers { path: PathBuf, mine: PathBuf, older: PathBuf, newer: PathBuf },
    SetPropertyConflictMarker { path: PathBuf, content: Vec<u8> },
    /// Runs post-commit bookkeeping (bump base revision, clear schedule) for
    /// a newly-committed path.
    PostCommit { path: PathBuf },
    /// Runs post-commit bookkeeping for a path whose commit action was a
    /// deletion.
    DeletionPostCommit { path: PathBuf },
}

/// A crash-safe, FIFO, idempotent log of [`WorkItem`]s.
///
/// The log is stored as one file containing one JSON object per line, in
/// the order items must run. [`WorkQueue::run`] executes from the front and
/// truncates the log (rewriting it without the completed prefix) after each
/// item, so a crash leaves the log pointing at exactly the unfinished work.
pub struct WorkQueue {
    log_path: PathBuf,
    items: Vec<WorkItem>,
}

impl WorkQueue {
    pub fn open(log_path: impl Into<PathBuf>) -> Result<Self, RvcError> {
        let log_path = log_path.into();
        let items = match fs::read_to_string(&log_path) {
            Ok(contents) => parse_log(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(RvcError::io(log_path, e)),
        };
        Ok(Self { log_path, items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Appends `item` to the end of the queue and persists it before
    /// returning, so the item is durable even if the process crashes before
    /// `run` is called.
    pub fn push(&mut self, item: WorkItem) -> Result<(), RvcError> {
        self.items.push(item);
        self.persist()
    }

    fn persist(&self) -> Result<(), RvcError> {
        let mut contents = String::new();
        for item in &self.items {
            contents.push_str(&serde_json::to_string(item).expect("WorkItem serialization cannot fail"));
            contents.push('\n');
        }
        let dir = self.log_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RvcError::io(self.log_path.clone(), e))?;
        temp.write_all(contents.as_bytes()).map_err(|e| RvcError::io(self.log_path.clone(), e))?;
        file_util::persist_temp_file(temp, &self.log_path).map_err(|e| RvcError::io(self.log_path.clone(), e))?;
        Ok(())
    }

    /// Runs every queued item in order, persisting the shrunken queue after
    /// each one completes. Stops and returns the error on the first failing
    /// item, leaving it (and everything after it) still queued so a re-run
    /// resumes from exactly that point.
    #[instrument(skip_all, fields(queued = self.items.len()))]
    pub fn run(&mut self, apply: &mut impl FnMut(&WorkItem) -> Result<(), RvcError>) -> Result<(), RvcError> {
        while !self.items.is_empty() {
            let item = &self.items[0];
            apply(item).inspect_err(|error| {
                tracing::warn!(?item, %error, "work queue item failed; queue left resumable");
            })?;
            self.items.remove(0);
            self.persist()?;
        }
        Ok(())
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }
}

fn parse_log(contents: &str) -> Result<Vec<WorkItem>, RvcError> {
    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| RvcError::tagged_with_source(crate::error::ErrorKind::MalformedFile, "malformed work queue log", e))
        })
        .collect()
}
