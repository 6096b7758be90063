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

//! Test helpers shared by `rvc-lib`'s integration tests: a disposable
//! on-disk store, a disposable on-disk working copy wired to it, and a
//! handful of path/content builders to cut down on boilerplate.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use itertools::Itertools as _;
use rvc_lib::dp::Depth;
use rvc_lib::dp::Reconciler;
use rvc_lib::dp::Report;
use rvc_lib::repo_path::RepoPath;
use rvc_lib::repo_path::RepoPathBuf;
use rvc_lib::rs::PropTable;
use rvc_lib::rs::Revision;
use rvc_lib::rs::RevisionStore;
use rvc_lib::wc::EntryStore;
use rvc_lib::wc::FsTreeEditor;
use rvc_lib::wc::WcLock;
use tempfile::TempDir;

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("rvc-test-")
        .tempdir()
        .unwrap()
}

pub fn repo_path(value: &str) -> &RepoPath {
    RepoPath::from_internal_string(value).unwrap()
}

pub fn repo_path_buf(value: impl Into<String>) -> RepoPathBuf {
    RepoPathBuf::from_internal_string(value.into()).unwrap()
}

/// A freshly created, empty revision store in its own temporary directory.
pub struct TestStore {
    temp_dir: TempDir,
    pub store: RevisionStore,
}

impl TestStore {
    pub fn init() -> Self {
        let temp_dir = new_temp_dir();
        let root = temp_dir.path().join("repo");
        fs::create_dir(&root).unwrap();
        let store = RevisionStore::create(&root).unwrap();
        Self { temp_dir, store }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn repo_path(&self) -> PathBuf {
        self.temp_dir.path().join("repo")
    }

    pub fn reopen(&self) -> RevisionStore {
        RevisionStore::open(self.repo_path()).unwrap()
    }
}

/// A single-transaction revision built by `path -> text` pairs, committed
/// with an empty log message. Returns the new revision number.
pub fn commit_tree(store: &mut RevisionStore, path_contents: &[(&str, &str)]) -> Revision {
    commit_tree_with_message(store, path_contents, "")
}

pub fn commit_tree_with_message(store: &mut RevisionStore, path_contents: &[(&str, &str)], message: &str) -> Revision {
    let mut txn = store.begin_txn();
    let mut made_dirs: HashSet<RepoPathBuf> = HashSet::new();
    for (path, contents) in path_contents {
        let path = repo_path(path);
        ensure_parents(&mut txn, path, &mut made_dirs);
        txn.make_file(path).unwrap();
        txn.write_contents(path, contents.as_bytes()).unwrap();
    }
    let mut revprops = PropTable::new();
    if !message.is_empty() {
        revprops.insert("rvc:log".to_string(), message.as_bytes().to_vec());
    }
    txn.commit(revprops).unwrap()
}

fn ensure_parents(txn: &mut rvc_lib::rs::Transaction<'_>, path: &RepoPath, made_dirs: &mut HashSet<RepoPathBuf>) {
    let Some((parent, _)) = path.split() else { return };
    let mut ancestor = RepoPathBuf::root();
    for component in parent.components() {
        ancestor = ancestor.join(component);
        if made_dirs.insert(ancestor.clone()) {
            let _ = txn.make_dir(&ancestor);
        }
    }
}

/// A disposable working copy, backed by a real temp directory, checked out
/// at the repository root.
pub struct TestWorkingCopy {
    temp_dir: TempDir,
    pub entries: EntryStore,
    _lock: WcLock,
}

impl TestWorkingCopy {
    pub fn checkout(store: &RevisionStore, revision: Revision) -> Self {
        let temp_dir = new_temp_dir();
        let root = temp_dir.path().join("wc");
        fs::create_dir(&root).unwrap();
        let mut entries = EntryStore::open(root.join("entries.json")).unwrap();
        let lock = WcLock::acquire(root.join("lock")).unwrap();
        {
            let mut editor = FsTreeEditor::new(root.clone(), &mut entries, revision);
            Reconciler::checkout_subtree(store, revision, &RepoPathBuf::root(), &mut editor).unwrap();
        }
        Self { temp_dir, entries, _lock: lock }
    }

    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("wc")
    }

    /// Drives an incremental update from `from_revision` to `to_revision`
    /// through the root-rooted reconciler, the same path a working copy
    /// checked out at the repository root takes.
    pub fn update(&mut self, store: &RevisionStore, from_revision: Revision, to_revision: Revision) {
        let root = self.root();
        let mut report = Report::new();
        report.set_path(RepoPathBuf::root(), from_revision, false, Depth::Infinity);
        let reconciler = Reconciler::new(store, to_revision);
        let mut editor = FsTreeEditor::new(root, &mut self.entries, to_revision);
        reconciler.drive(&report, &mut editor).unwrap();
    }

    pub fn write_file(&self, path: &str, contents: &str) {
        let fs_path = self.root().join(path);
        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(fs_path, contents).unwrap();
    }

    pub fn read_file(&self, path: &str) -> String {
        fs::read_to_string(self.root().join(path)).unwrap()
    }
}

/// Panic if `CI` environment variable is set to a non-empty value.
#[track_caller]
pub fn ensure_running_outside_ci(reason: &str) {
    let running_in_ci = std::env::var("CI").is_ok_and(|value| !value.is_empty());
    assert!(!running_in_ci, "Running in CI, {reason}.");
}

/// Checks that every `.rs` file under `test_dir` is declared as a `[[test]]`
/// binary or included as a `mod` of one, so a forgotten file doesn't
/// silently drop out of the suite.
pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let manifest = {
        let file_path = test_dir.parent().unwrap().join("Cargo.toml");
        let text = fs::read_to_string(&file_path).unwrap();
        toml_edit::ImDocument::parse(text).unwrap()
    };
    let test_bin_mods = if let Some(item) = manifest.get("test") {
        let tables = item.as_array_of_tables().unwrap();
        tables
            .iter()
            .map(|test| test.get("name").unwrap().as_str().unwrap().to_owned())
            .collect()
    } else {
        vec![]
    };

    let mut test_mods: HashSet<_> = test_bin_mods
        .iter()
        .flat_map(|test_mod| {
            let test_mod_path = test_dir.join(test_mod).with_extension("rs");
            let test_mod_contents = fs::read_to_string(&test_mod_path).unwrap();
            test_mod_contents
                .lines()
                .map(|line| line.trim_start_matches("pub "))
                .filter_map(|line| line.strip_prefix("mod"))
                .filter_map(|line| line.strip_suffix(";"))
                .map(|line| line.trim().to_string())
                .collect_vec()
        })
        .collect();
    test_mods.extend(test_bin_mods);

    let test_mod_files: HashSet<_> = fs::read_dir(test_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_os_string().into_string().ok()))
        .collect();

    assert!(
        test_mod_files.is_subset(&test_mods),
        "the following test source files are not declared as integration tests nor included as \
         submodules of one: {}",
        test_mod_files.difference(&test_mods).map(|mod_stem| format!("{mod_stem}.rs")).join(", "),
    );
}
