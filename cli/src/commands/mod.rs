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

//! Shared working-copy bookkeeping for every subcommand that touches a
//! checked-out tree: the on-disk `.rvc/` layout and the [`Workspace`] handle
//! that bundles an opened `RevisionStore`, `EntryStore`, and held `WcLock`.
//!
//! Grounded in `rvc_lib::config`'s own "write as a `toml_edit` document, read
//! back through serde" split (`lib/src/config.rs`'s `StackedConfig`): the
//! same shape is used here for the per-working-copy format file, just for a
//! single untyped-precedence document instead of a layered one.

pub mod add;
pub mod admin;
pub mod checkout;
pub mod commit;
pub mod diff;
pub mod log;
pub mod remove;
pub mod revert;
pub mod serve;
pub mod status;
pub mod switch;
pub mod update;

use std::path::Path;
use std::path::PathBuf;

use rvc_lib::dp::Depth;
use rvc_lib::dp::Reconciler;
use rvc_lib::dp::Report;
use rvc_lib::file_util;
use rvc_lib::repo_path::RepoPath;
use rvc_lib::repo_path::RepoPathBuf;
use rvc_lib::repo_path::RepoPathUiConverter;
use rvc_lib::rs::PropTable;
use rvc_lib::rs::Revision;
use rvc_lib::rs::RevisionStore;
use rvc_lib::wc::EntryStore;
use rvc_lib::wc::EolStrategy;
use rvc_lib::wc::FsTreeEditor;
use rvc_lib::wc::WcLock;
use serde::Deserialize;
use serde::Serialize;

use crate::command_error::CommandError;
use crate::command_error::CommandErrorKind;

const MARKER_DIR: &str = ".rvc";
const FORMAT_FILE: &str = "format.toml";
const ENTRIES_FILE: &str = "entries.json";
const LOCK_FILE: &str = "lock";

/// The persisted shape of a working copy's `.rvc/format.toml`: which
/// repository it mirrors, which repo-relative subtree is checked out at its
/// root, and the revision it was last brought up to date with.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct WorkspaceFormatDoc {
    repo_root: PathBuf,
    prefix: String,
    revision: Revision,
}

/// A checked-out working copy: its root path, the repository it mirrors,
/// and the entry database and advisory lock that track its local state.
///
/// The lock is held for the `Workspace`'s whole lifetime and released on
/// drop, the same reentrant-per-process discipline `WcLock` itself
/// documents; every subcommand that mutates the working copy opens one
/// `Workspace` and keeps it alive for the duration of the command.
pub struct Workspace {
    pub root: PathBuf,
    pub repo_root: PathBuf,
    pub prefix: RepoPathBuf,
    pub revision: Revision,
    pub store: RevisionStore,
    pub entries: EntryStore,
    _lock: WcLock,
}

impl Workspace {
    fn marker_dir(root: &Path) -> PathBuf {
        root.join(MARKER_DIR)
    }

    /// Walks `start` and its ancestors for a `.rvc` marker directory, the
    /// same root-discovery shape as `.git`/`.svn`.
    pub fn open(start: &Path) -> Result<Self, CommandError> {
        let start = std::path::absolute(start)?;
        let root = start
            .ancestors()
            .find(|candidate| Self::marker_dir(candidate).is_dir())
            .ok_or_else(|| {
                CommandError::user(format!(
                    "{}: not inside a checked-out working copy (no .rvc directory found)",
                    start.display()
                ))
            })?
            .to_path_buf();
        let marker = Self::marker_dir(&root);
        let doc = read_format(&marker.join(FORMAT_FILE))?;
        let store = RevisionStore::open(&doc.repo_root)?;
        let entries = EntryStore::open(marker.join(ENTRIES_FILE))?;
        let lock = WcLock::acquire(marker.join(LOCK_FILE))?;
        let prefix = RepoPathBuf::from_internal_string(doc.prefix)
            .map_err(|e| CommandError::internal(format!("corrupt working-copy format file: {e}")))?;
        Ok(Self {
            root,
            repo_root: doc.repo_root,
            prefix,
            revision: doc.revision,
            store,
            entries,
            _lock: lock,
        })
    }

    /// Creates a fresh working copy rooted at `root`, against `repo_root`,
    /// with no subtree materialized yet. Callers finish setup by calling
    /// [`Self::materialize`].
    pub fn create(root: &Path, repo_root: PathBuf) -> Result<Self, CommandError> {
        file_util::create_or_reuse_dir(root)?;
        let marker = Self::marker_dir(root);
        file_util::create_or_reuse_dir(&marker)?;
        let store = RevisionStore::open(&repo_root)?;
        let entries = EntryStore::open(marker.join(ENTRIES_FILE))?;
        let lock = WcLock::acquire(marker.join(LOCK_FILE))?;
        let workspace = Self {
            root: root.to_path_buf(),
            repo_root,
            prefix: RepoPathBuf::root(),
            revision: 0,
            store,
            entries,
            _lock: lock,
        };
        workspace.persist_format()?;
        Ok(workspace)
    }

    pub fn persist_format(&self) -> Result<(), CommandError> {
        let doc = WorkspaceFormatDoc {
            repo_root: self.repo_root.clone(),
            prefix: self.prefix.clone().into_internal_string(),
            revision: self.revision,
        };
        write_format(&Self::marker_dir(&self.root).join(FORMAT_FILE), &doc)
    }

    /// Materializes `prefix` of the repository as of `revision` as this
    /// working copy's entire tree, via full re-checkout rather than an
    /// incremental update report.
    ///
    /// Used by both `checkout` (against a brand-new, empty entry database)
    /// and `switch` (against an existing one) — the two differ only in
    /// which `EntryStore` they start from, since
    /// `Reconciler::checkout_subtree` always materializes from an empty
    /// report. `update` uses [`Self::update`] instead, which reports the
    /// working copy's actual recorded state so unchanged subtrees are left
    /// untouched.
    pub fn materialize(&mut self, prefix: &RepoPath, revision: Revision) -> Result<(), CommandError> {
        let mut editor = FsTreeEditor::new(self.root.clone(), &mut self.entries, revision);
        Reconciler::checkout_subtree(&self.store, revision, prefix, &mut editor)?;
        self.prefix = prefix.to_owned();
        self.revision = revision;
        self.persist_format()?;
        Ok(())
    }

    /// Brings the working copy up to `revision`.
    ///
    /// `Reconciler::drive` always resolves its target against the
    /// repository root (§ the report mechanism has no "rooted at a prefix"
    /// mode), so it only applies to a working copy checked out at the repo
    /// root; a prefix-rooted checkout falls back to the same full
    /// re-materialization `switch` uses, just at the same prefix.
    pub fn update(&mut self, revision: Revision) -> Result<(), CommandError> {
        let mut editor = FsTreeEditor::new(self.root.clone(), &mut self.entries, revision);
        if self.prefix.is_root() {
            let mut report = Report::new();
            report.set_path(RepoPathBuf::root(), self.revision, false, Depth::Infinity);
            let reconciler = Reconciler::new(&self.store, revision);
            reconciler.drive(&report, &mut editor)?;
        } else {
            let prefix = self.prefix.clone();
            Reconciler::checkout_subtree(&self.store, revision, &prefix, &mut editor)?;
        }
        self.revision = revision;
        self.persist_format()?;
        Ok(())
    }

    pub fn ui_converter(&self) -> RepoPathUiConverter {
        RepoPathUiConverter::Fs { cwd: self.root.clone(), base: self.root.clone() }
    }
}

/// Reads the `rvc:eol` property the same way [`rvc_lib::wc::FsTreeEditor`]
/// does internally, for callers (`status`, `commit`, `diff`) that need a
/// [`rvc_lib::wc::Translator`] of their own to reproduce its repository-form
/// bytes without going through the editor.
pub fn eol_strategy(props: &PropTable) -> EolStrategy {
    match props.get("rvc:eol").and_then(|v| std::str::from_utf8(v).ok()) {
        Some("lf") => EolStrategy::Lf,
        Some("crlf") => EolStrategy::Crlf,
        _ => EolStrategy::None,
    }
}

fn read_format(path: &Path) -> Result<WorkspaceFormatDoc, CommandError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CommandError::with_source(CommandErrorKind::Config, format!("{}: {e}", path.display()), e)
    })?;
    toml_edit::de::from_str(&text).map_err(|e| CommandError::config(format!("{}: {e}", path.display())))
}

fn write_format(path: &Path, doc: &WorkspaceFormatDoc) -> Result<(), CommandError> {
    let mut document = toml_edit::DocumentMut::new();
    document["repo_root"] = toml_edit::value(doc.repo_root.to_string_lossy().into_owned());
    document["prefix"] = toml_edit::value(doc.prefix.clone());
    document["revision"] = toml_edit::value(doc.revision as i64);
    std::fs::write(path, document.to_string()).map_err(CommandError::from)
}
