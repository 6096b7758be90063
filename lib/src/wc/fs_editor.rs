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

//! [`TreeEditor`] adapter that applies an edit stream to an on-disk working
//! copy (§4.2-§4.3): the client side of the delta protocol, driven by
//! [`Reconciler::drive`] during checkout/update/switch/revert.
//!
//! [`Reconciler::drive`]: crate::dp::report::Reconciler::drive

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

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
use crate::rs::NodeKind;
use crate::rs::Revision;
use crate::rs::checksum::StrongChecksum;
use crate::wc::EolStrategy;
use crate::wc::Translator;
use crate::wc::WcEntry;
use crate::wc::entry::Fingerprint;
use crate::wc::entry::Schedule;
use crate::wc::entry_store::EntryStore;

struct PendingFile {
    text: Vec<u8>,
    eol: EolStrategy,
}

/// Applies a tree-editor call stream to the working copy rooted at
/// `root_path`, updating `entries` alongside.
///
/// Only byte-for-byte EOL translation is honored (via the `rvc:eol`
/// property, streamed in through `change_file_prop` before `close_file`);
/// keyword expansion and real platform-symlink materialization are left to
/// a future pass, since neither is wired into [`Translator`] yet either.
pub struct FsTreeEditor<'a> {
    root_path: PathBuf,
    entries: &'a mut EntryStore,
    target_revision: Revision,
    handles: HandleAllocator,
    dir_paths: HashMap<DirHandle, RepoPathBuf>,
    file_paths: HashMap<FileHandle, RepoPathBuf>,
    pending_files: HashMap<FileHandle, PendingFile>,
}

impl<'a> FsTreeEditor<'a> {
    pub fn new(root_path: impl Into<PathBuf>, entries: &'a mut EntryStore, target_revision: Revision) -> Self {
        Self {
            root_path: root_path.into(),
            entries,
            target_revision,
            handles: HandleAllocator::new(),
            dir_paths: HashMap::new(),
            file_paths: HashMap::new(),
            pending_files: HashMap::new(),
        }
    }

    fn fs_path(&self, path: &RepoPath) -> Result<PathBuf, RvcError> {
        path.to_fs_path(&self.root_path)
            .map_err(|_| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: invalid working-copy path", path.as_internal_file_string())))
    }

    fn eol_from_prop(value: Option<&[u8]>) -> EolStrategy {
        match value.and_then(|v| std::str::from_utf8(v).ok()) {
            Some("lf") => EolStrategy::Lf,
            Some("crlf") => EolStrategy::Crlf,
            _ => EolStrategy::None,
        }
    }
}

impl TreeEditor for FsTreeEditor<'_> {
    fn open_root(&mut self, _base_revision: Revision) -> Result<DirHandle, RvcError> {
        fs::create_dir_all(&self.root_path).map_err(|e| RvcError::io(self.root_path.clone(), e))?;
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, RepoPathBuf::root());
        Ok(handle)
    }

    fn delete_entry(&mut self, path: &RepoPath, _base_revision: Option<Revision>, _parent: DirHandle) -> Result<(), RvcError> {
        let fs_path = self.fs_path(path)?;
        match fs::metadata(&fs_path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&fs_path).map_err(|e| RvcError::io(fs_path, e))?,
            Ok(_) => fs::remove_file(&fs_path).map_err(|e| RvcError::io(fs_path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RvcError::io(fs_path, e)),
        }
        self.entries.remove_entry(path);
        Ok(())
    }

    fn add_directory(&mut self, path: &RepoPath, _parent: DirHandle, _copyfrom: Option<CopyFrom>) -> Result<DirHandle, RvcError> {
        let fs_path = self.fs_path(path)?;
        fs::create_dir_all(&fs_path).map_err(|e| RvcError::io(fs_path, e))?;
        self.entries.write_entry(path.to_owned(), WcEntry::normal(NodeKind::Directory, self.target_revision));
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, path.to_owned());
        Ok(handle)
    }

    fn open_directory(&mut self, path: &RepoPath, _parent: DirHandle, _base_revision: Revision) -> Result<DirHandle, RvcError> {
        let handle = self.handles.next_dir();
        self.dir_paths.insert(handle, path.to_owned());
        Ok(handle)
    }

    fn change_dir_prop(&mut self, _dir: DirHandle, _name: &str, _value: Option<Vec<u8>>) -> Result<(), RvcError> {
        // Directory properties aren't reflected on disk; they live only in
        // the entry database, and the entry for this path is written by
        // `add_directory`/`open_directory`'s caller once, not per-property.
        Ok(())
    }

    fn close_directory(&mut self, dir: DirHandle) -> Result<(), RvcError> {
        if let Some(path) = self.dir_paths.remove(&dir)
            && !path.is_root()
            && self.entries.read_entry(&path).is_none()
        {
            self.entries.write_entry(path, WcEntry::normal(NodeKind::Directory, self.target_revision));
        }
        Ok(())
    }

    fn add_file(&mut self, path: &RepoPath, _parent: DirHandle, _copyfrom: Option<CopyFrom>) -> Result<FileHandle, RvcError> {
        let handle = self.handles.next_file();
        self.file_paths.insert(handle, path.to_owned());
        self.pending_files.insert(handle, PendingFile { text: Vec::new(), eol: EolStrategy::None });
        Ok(handle)
    }

    fn open_file(&mut self, path: &RepoPath, _parent: DirHandle, _base_revision: Revision) -> Result<FileHandle, RvcError> {
        let fs_path = self.fs_path(path)?;
        let on_disk = fs::read(&fs_path).unwrap_or_default();
        let eol = Self::eol_from_prop(None);
        let base_text = Translator::new(eol, Vec::new(), false).to_repository_form(&on_disk)?;
        let handle = self.handles.next_file();
        self.file_paths.insert(handle, path.to_owned());
        self.pending_files.insert(handle, PendingFile { text: base_text, eol });
        Ok(handle)
    }

    fn apply_textdelta(&mut self, file: FileHandle, base_checksum: Option<StrongChecksum>, windows: &[TextDeltaWindow]) -> Result<(), RvcError> {
        let pending = self
            .pending_files
            .get_mut(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?;
        if let Some(expected) = &base_checksum {
            let actual = crate::rs::checksum::checksum_bytes(&pending.text).strong;
            if &actual != expected {
                return Err(RvcError::tagged(ErrorKind::MalformedFile, "base checksum does not match"));
            }
        }
        pending.text = apply_windows(&pending.text, windows)?;
        Ok(())
    }

    fn change_file_prop(&mut self, file: FileHandle, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError> {
        if name == "rvc:eol"
            && let Some(pending) = self.pending_files.get_mut(&file)
        {
            pending.eol = Self::eol_from_prop(value.as_deref());
        }
        Ok(())
    }

    fn close_file(&mut self, file: FileHandle, result_checksum: Option<StrongChecksum>) -> Result<(), RvcError> {
        let path = self
            .file_paths
            .remove(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?;
        let pending = self
            .pending_files
            .remove(&file)
            .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "unknown file handle"))?;
        if let Some(expected) = &result_checksum {
            let actual = crate::rs::checksum::checksum_bytes(&pending.text).strong;
            if &actual != expected {
                return Err(RvcError::tagged(ErrorKind::MalformedFile, "result checksum does not match"));
            }
        }
        let fs_path = self.fs_path(&path)?;
        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RvcError::io(parent.to_path_buf(), e))?;
        }
        let translator = Translator::new(pending.eol, Vec::new(), false);
        let working_bytes = translator.to_working_form(&pending.text)?;
        fs::write(&fs_path, &working_bytes).map_err(|e| RvcError::io(fs_path.clone(), e))?;
        let fingerprint = fs::metadata(&fs_path)
            .ok()
            .map(|meta| Fingerprint {
                size: Some(meta.len()),
                mtime_secs: None,
                mtime_nanos: None,
            })
            .unwrap_or_default();
        let mut entry = WcEntry::normal(NodeKind::File, self.target_revision);
        entry.schedule = Schedule::Normal;
        entry.text_fingerprint = fingerprint;
        self.entries.write_entry(path, entry);
        Ok(())
    }

    fn close_edit(&mut self) -> Result<(), RvcError> {
        self.entries.sync()
    }

    fn abort_edit(&mut self) -> Result<(), RvcError> {
        Ok(())
    }
}
