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

//! The tree editor interface (C3a): the depth-first callback protocol that a
//! driver (report reconciler, commit driver) plays against a receiver
//! (checkout materializer, merge driver, commit transaction adapter).
//!
//! [`TreeEditor`] is the "polymorphic capability set" pattern: one trait,
//! several receivers, rather than a `(function pointer, opaque baton)` pair.
//! Handles are opaque newtypes minted by whichever editor implementation owns
//! them, never raw pointers.

use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathBuf;
use crate::rs::Revision;
use crate::rs::StrongChecksum;

/// An opaque handle to a directory the driver has opened or added but not
/// yet closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DirHandle(u64);

/// An opaque handle to a file the driver has opened or added but not yet
/// closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

/// Allocates sequential, never-reused [`DirHandle`]/[`FileHandle`] values.
/// Every [`TreeEditor`] implementation owns one of these.
#[derive(Debug, Default)]
pub struct HandleAllocator(u64);

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_dir(&mut self) -> DirHandle {
        self.0 += 1;
        DirHandle(self.0)
    }

    pub fn next_file(&mut self) -> FileHandle {
        self.0 += 1;
        FileHandle(self.0)
    }
}

/// The source of a copy-based add (`add-directory`/`add-file` with
/// copyfrom).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyFrom {
    pub path: RepoPathBuf,
    pub revision: Revision,
}

/// One operation within a [`TextDeltaWindow`]. Unlike the wire encoding
/// (C6), which packs `new` data into a shared per-window buffer addressed by
/// offset, the in-process form inlines the literal bytes directly: the
/// offset/length-into-buffer indirection is a wire-framing concern, not part
/// of this driver-facing contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextDeltaOp {
    /// Copies `len` bytes from the base text starting at `offset`.
    CopyFromSource { offset: usize, len: usize },
    /// Copies `len` bytes from the target text produced so far, starting at
    /// `offset` (enables run-length-style self-reference).
    CopyFromTarget { offset: usize, len: usize },
    /// Emits literal bytes not present in the base text.
    New(Vec<u8>),
}

/// A single text-delta window: a suffix of the target stream, described as a
/// sequence of [`TextDeltaOp`]s over a source view of the base text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextDeltaWindow {
    pub source_offset: usize,
    pub source_length: usize,
    pub ops: Vec<TextDeltaOp>,
}

impl TextDeltaWindow {
    /// The length of the target bytes this window produces.
    pub fn target_length(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                TextDeltaOp::CopyFromSource { len, .. } => *len,
                TextDeltaOp::CopyFromTarget { len, .. } => *len,
                TextDeltaOp::New(bytes) => bytes.len(),
            })
            .sum()
    }
}

/// Builds the minimal text delta from `base` to `target`: a common prefix
/// and common suffix copied from the source, with the differing middle
/// emitted as literal `new` data. This is not a general diff algorithm (the
/// three-way text *merge* is explicitly an external oracle per spec); it is
/// the core's own byte-oriented encoding of "how did the file change".
pub fn diff_to_windows(base: &[u8], target: &[u8]) -> Vec<TextDeltaWindow> {
    if base.is_empty() && target.is_empty() {
        return Vec::new();
    }
    let prefix_len = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = (base.len() - prefix_len).min(target.len() - prefix_len);
    let suffix_len = (0..max_suffix)
        .take_while(|i| base[base.len() - 1 - i] == target[target.len() - 1 - i])
        .count();

    let mut ops = Vec::new();
    if prefix_len > 0 {
        ops.push(TextDeltaOp::CopyFromSource { offset: 0, len: prefix_len });
    }
    let middle = &target[prefix_len..target.len() - suffix_len];
    if !middle.is_empty() {
        ops.push(TextDeltaOp::New(middle.to_vec()));
    }
    if suffix_len > 0 {
        ops.push(TextDeltaOp::CopyFromSource {
            offset: base.len() - suffix_len,
            len: suffix_len,
        });
    }
    vec![TextDeltaWindow {
        source_offset: 0,
        source_length: base.len(),
        ops,
    }]
}

/// Reconstructs the target bytes that `windows` produce when applied on top
/// of `base`. The consumer-side counterpart of [`diff_to_windows`].
pub fn apply_windows(base: &[u8], windows: &[TextDeltaWindow]) -> Result<Vec<u8>, RvcError> {
    let mut target = Vec::new();
    for window in windows {
        for op in &window.ops {
            match op {
                TextDeltaOp::CopyFromSource { offset, len } => {
                    let end = offset.checked_add(*len).ok_or_else(malformed_delta)?;
                    let slice = base.get(*offset..end).ok_or_else(malformed_delta)?;
                    target.extend_from_slice(slice);
                }
                TextDeltaOp::CopyFromTarget { offset, len } => {
                    let end = offset.checked_add(*len).ok_or_else(malformed_delta)?;
                    let slice = target.get(*offset..end).ok_or_else(malformed_delta)?.to_vec();
                    target.extend_from_slice(&slice);
                }
                TextDeltaOp::New(bytes) => target.extend_from_slice(bytes),
            }
        }
    }
    Ok(target)
}

fn malformed_delta() -> RvcError {
    RvcError::tagged(crate::error::ErrorKind::MalformedFile, "text-delta window references out-of-range offset")
}

/// The stateful, depth-first callback protocol a driver plays against a
/// receiver.
///
/// Ordering contract: for any [`DirHandle`] `d`, every call naming `d` as
/// parent happens before `close_directory(d)`; no sibling of `d` is touched
/// until `d` is closed. Property and text-delta calls on a file handle may
/// interleave in any order, but all precede `close_file`. `abort_edit` is
/// mutually exclusive with `close_edit` and may be called at any time.
pub trait TreeEditor {
    fn open_root(&mut self, base_revision: Revision) -> Result<DirHandle, RvcError>;

    fn delete_entry(&mut self, path: &RepoPath, base_revision: Option<Revision>, parent: DirHandle) -> Result<(), RvcError>;

    fn add_directory(&mut self, path: &RepoPath, parent: DirHandle, copyfrom: Option<CopyFrom>) -> Result<DirHandle, RvcError>;

    fn open_directory(&mut self, path: &RepoPath, parent: DirHandle, base_revision: Revision) -> Result<DirHandle, RvcError>;

    fn change_dir_prop(&mut self, dir: DirHandle, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError>;

    fn close_directory(&mut self, dir: DirHandle) -> Result<(), RvcError>;

    fn add_file(&mut self, path: &RepoPath, parent: DirHandle, copyfrom: Option<CopyFrom>) -> Result<FileHandle, RvcError>;

    fn open_file(&mut self, path: &RepoPath, parent: DirHandle, base_revision: Revision) -> Result<FileHandle, RvcError>;

    /// Applies a text delta (the full window list; see [`TextDeltaWindow`])
    /// against `file`'s current content, optionally checked against
    /// `base_checksum` before applying.
    fn apply_textdelta(&mut self, file: FileHandle, base_checksum: Option<StrongChecksum>, windows: &[TextDeltaWindow]) -> Result<(), RvcError>;

    fn change_file_prop(&mut self, file: FileHandle, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError>;

    /// Closes `file`. `result_checksum`, if given, is verified against the
    /// file's final content.
    fn close_file(&mut self, file: FileHandle, result_checksum: Option<StrongChecksum>) -> Result<(), RvcError>;

    fn close_edit(&mut self) -> Result<(), RvcError>;

    fn abort_edit(&mut self) -> Result<(), RvcError>;
}
