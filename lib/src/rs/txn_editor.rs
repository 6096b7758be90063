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

//! [`TreeEditor`] adapter over a [`Transaction`] (§3, §4.10): the server
//! side of the delta protocol, where edit calls from [`drive_commit`] turn
//! directly into transaction mutations instead of wire bytes.
//!
//! [`drive_commit`]: crate::dp::commit_driver::drive_commit

use std::collections::HashMap;

use crate::dp::editor::CopyFrom;
use crate::dp::editor::DirHandle;
use crate::dp::editor::FileHandle;
use crate::dp::editor::HandleAllocator;
use crate::dp::editor::TextDeltaWindow;
use crate::dp::editor::TreeEditor;
use crate::dp::editor::apply_windows;
use crate::error::ErrorKind;
use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathBuf;
use crate::rs::checksum::StrongChecksum;
use crate::rs::transaction::Transaction;
use crate::rs::tree::Revision;

/// Applies a tree-editor call stream to a live [`Transaction`].
///
/// Text is buffered in memory per open file handle and written to the
/// transaction's object store once on `close_file`, since `Transaction`
/// only exposes whole-content writes, not incremental deltas. Base text for
/// `open_file`/copy-based `add_file` is read through the transaction itself
/// ([`Transaction::read_committed_file`]) rather than a separately held
/// `&RevisionStore`, since the transaction already holds the store borrowed
/// mutably for its own lifetime.
pub struct TransactionTreeEditor<'a, 'repo> {
    txn: &'a mut Transaction<'repo>,
    handles: HandleAllocator,
    dir_paths: HashMap<DirHandle, RepoPathBuf>,
    file_paths: HashMap<FileHandle, RepoPathBuf>,
    pending_text: HashMap<FileHandle, Vec<u8>>,
}

impl<'a, 'repo> TransactionTreeEditor<'a, 'repo> {
    pub fn new(txn: &'a mut Transaction<'repo>) -> Self {
        Self {
            txn,
            handles: HandleAllocator::new(),
            dir_paths: HashMap::new(),
            file_paths: HashMap::new(),
            pending_text: HashMap::new(),
        }
    }

    fn dir_path(&self, dir: DirHandle) -> Result<&RepoPath, RvcError> {
        self.dir_paths
            .get(&dir)
            .map(|p| p.as_ref())
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown directory handle"))
    }
}

impl TreeEditor for TransactionTreeEditor<'_, '_> {
    fn open_root(&mut self, _base_revision: Revision) -> Result<DirHandle, RvcError> {
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, RepoPathBuf::root());
        Ok(handle)
    }

    fn delete_entry(&mut self, path: &RepoPath, _base_revision: Option<Revision>, _parent: DirHandle) -> Result<(), RvcError> {
        self.txn.delete(path)
    }

    fn add_directory(&mut self, path: &RepoPath, _parent: DirHandle, copyfrom: Option<CopyFrom>) -> Result<DirHandle, RvcError> {
        match copyfrom {
            Some(copyfrom) => self.txn.copy(&copyfrom.path, copyfrom.revision, path)?,
            None => self.txn.make_dir(path)?,
        }
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, path.to_owned());
        Ok(handle)
    }

    fn open_directory(&mut self, path: &RepoPath, _parent: DirHandle, _base_revision: Revision) -> Result<DirHandle, RvcError> {
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, path.to_owned());
        Ok(handle)
    }

    fn change_dir_prop(&mut self, dir: DirHandle, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError> {
        let path = self.dir_path(dir)?.to_owned();
        self.txn.set_prop(&path, name, value)
    }

    fn close_directory(&mut self, dir: DirHandle) -> Result<(), RvcError> {
        self.dir_paths.remove(&dir);
        Ok(())
    }

    fn add_file(&mut self, path: &RepoPath, _parent: DirHandle, copyfrom: Option<CopyFrom>) -> Result<FileHandle, RvcError> {
        let base_text = match copyfrom {
            Some(copyfrom) => {
                self.txn.copy(&copyfrom.path, copyfrom.revision, path)?;
                self.txn.read_committed_file(copyfrom.revision, &copyfrom.path)?
            }
            None => {
                self.txn.make_file(path)?;
                Vec::new()
            }
        };
        let handle = self.handles.next_file();
        self.file_paths.insert(handle, path.to_owned());
        self.pending_text.insert(handle, base_text);
        Ok(handle)
    }

    fn open_file(&mut self, path: &RepoPath, _parent: DirHandle, base_revision: Revision) -> Result<FileHandle, RvcError> {
        let base_text = self.txn.read_committed_file(base_revision, path)?;
        let handle = self.handles.next_file();
        self.file_paths.insert(handle, path.to_owned());
        self.pending_text.insert(handle, base_text);
        Ok(handle)
    }

    fn apply_textdelta(&mut self, file: FileHandle, base_checksum: Option<StrongChecksum>, windows: &[TextDeltaWindow]) -> Result<(), RvcError> {
        let base = self
            .pending_text
            .get(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?;
        if let Some(expected) = &base_checksum {
            let actual = crate::rs::checksum::checksum_bytes(base).strong;
            if &actual != expected {
                return Err(RvcError::tagged(ErrorKind::MalformedFile, "base checksum does not match"));
            }
        }
        let new_text = apply_windows(base, windows)?;
        self.pending_text.insert(file, new_text);
        Ok(())
    }

    fn change_file_prop(&mut self, file: FileHandle, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError> {
        let path = self
            .file_paths
            .get(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?
            .to_owned();
        self.txn.set_prop(&path, name, value)
    }

    fn close_file(&mut self, file: FileHandle, result_checksum: Option<StrongChecksum>) -> Result<(), RvcError> {
        let path = self
            .file_paths
            .remove(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?;
        let text = self.pending_text.remove(&file).unwrap_or_default();
        if let Some(expected) = &result_checksum {
            let actual = crate::rs::checksum::checksum_bytes(&text).strong;
            if &actual != expected {
                return Err(RvcError::tagged(ErrorKind::MalformedFile, "result checksum does not match"));
            }
        }
        self.txn.write_contents(&path, &text)
    }

    fn close_edit(&mut self) -> Result<(), RvcError> {
        Ok(())
    }

    fn abort_edit(&mut self) -> Result<(), RvcError> {
        Ok(())
    }
}
