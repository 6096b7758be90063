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

//! The report reconciler (C3b): turns a client's declared mixed-revision
//! tree state (a [`Report`]) into the minimal server-driven edit stream that
//! brings the client to `target_revision`.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::dp::editor::CopyFrom;
use crate::dp::editor::DirHandle;
use crate::dp::editor::TreeEditor;
use crate::dp::editor::diff_to_windows;
use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathBuf;
use crate::repo_path::RepoPathComponentBuf;
use crate::rs::Node;
use crate::rs::NodeKind;
use crate::rs::NodePayload;
use crate::rs::Revision;
use crate::rs::RevisionStore;

/// How far below a reported path the client's knowledge extends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depth {
    Empty,
    Files,
    Immediates,
    Infinity,
}

/// One client → server report operation (spec §4.8).
#[derive(Clone, Debug, PartialEq, Eq)]
enum ReportItem {
    Path {
        revision: Revision,
        url: Option<String>,
        start_empty: bool,
        depth: Depth,
    },
    Deleted,
}

/// The client's declared mixed-revision tree state, built up from
/// `set-path`/`link-path`/`delete-path` calls before `finish-report`.
#[derive(Clone, Debug, Default)]
pub struct Report {
    items: BTreeMap<RepoPathBuf, ReportItem>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_path(&mut self, path: RepoPathBuf, revision: Revision, start_empty: bool, depth: Depth) {
        self.items.insert(
            path,
            ReportItem::Path { revision, url: None, start_empty, depth },
        );
    }

    pub fn link_path(&mut self, path: RepoPathBuf, url: String, revision: Revision, start_empty: bool, depth: Depth) {
        self.items.insert(
            path,
            ReportItem::Path { revision, url: Some(url), start_empty, depth },
        );
    }

    pub fn delete_path(&mut self, path: RepoPathBuf) {
        self.items.insert(path, ReportItem::Deleted);
    }
}

/// The client's reported state of a single path, resolved through
/// inheritance from the nearest reported ancestor.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Reported {
    revision: Revision,
    depth: Depth,
}

/// Resolves [`Report`] entries into a per-path effective state, honoring
/// inheritance: a path not explicitly mentioned inherits its nearest
/// explicitly-reported ancestor's revision, unless that ancestor reported
/// `start_empty` or a depth that doesn't reach this far.
fn reported_state(report: &Report, path: &RepoPath) -> Option<Reported> {
    for ancestor in path.ancestors() {
        match report.items.get(ancestor) {
            Some(ReportItem::Deleted) => return None,
            Some(ReportItem::Path { revision, start_empty, depth, .. }) => {
                if ancestor == path {
                    return Some(Reported { revision: *revision, depth: *depth });
                }
                if *start_empty {
                    return None;
                }
                let distance = ancestor_distance(ancestor, path);
                let reaches = match depth {
                    Depth::Empty => false,
                    Depth::Files => distance <= 1,
                    Depth::Immediates => distance <= 1,
                    Depth::Infinity => true,
                };
                if !reaches {
                    return None;
                }
                return Some(Reported {
                    revision: *revision,
                    depth: if distance >= 1 { Depth::Infinity } else { *depth },
                });
            }
            None => continue,
        }
    }
    None
}

fn ancestor_distance(ancestor: &RepoPath, path: &RepoPath) -> usize {
    path.components().count() - ancestor.components().count()
}

/// Drives `editor` with the edit stream that reconciles `report` against
/// `target_revision`.
pub struct Reconciler<'a> {
    store: &'a RevisionStore,
    target_revision: Revision,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a RevisionStore, target_revision: Revision) -> Self {
        Self { store, target_revision }
    }

    #[tracing::instrument(skip_all, fields(target_revision = self.target_revision))]
    pub fn drive(&self, report: &Report, editor: &mut dyn TreeEditor) -> Result<(), RvcError> {
        let target_root = self.store.node_at(self.target_revision, RepoPath::root())?;
        let root_reported = reported_state(report, RepoPath::root());
        let open_revision = root_reported.as_ref().map(|r| r.revision).unwrap_or(self.target_revision);
        let handle = editor.open_root(open_revision)?;
        self.reconcile_directory(report, RepoPath::root(), &target_root, root_reported, handle, editor)?;
        editor.close_edit()
    }

    /// Materializes the subtree rooted at `source_prefix` as of
    /// `target_revision` into `editor` as if it were the repository root:
    /// the working-copy analog of `switch`, where the checkout now tracks a
    /// different path in the same tree. Always a full materialization (no
    /// reported state to diff against), since the prior checkout's paths
    /// don't correspond to nodes under the new prefix.
    pub fn checkout_subtree(store: &'a RevisionStore, target_revision: Revision, source_prefix: &RepoPath, editor: &mut dyn TreeEditor) -> Result<(), RvcError> {
        let reconciler = Self { store, target_revision };
        let target_root = store.node_at(target_revision, source_prefix)?;
        let handle = editor.open_root(target_revision)?;
        reconciler.reconcile_directory(&Report::new(), RepoPath::root(), &target_root, None, handle, editor)?;
        editor.close_edit()
    }

    fn reported_node(&self, reported: &Option<Reported>, path: &RepoPath) -> Option<Arc<Node>> {
        let reported = reported.as_ref()?;
        self.store.node_at(reported.revision, path).ok()
    }

    fn reconcile_directory(
        &self,
        report: &Report,
        path: &RepoPath,
        target_dir: &Arc<Node>,
        reported: Option<Reported>,
        handle: DirHandle,
        editor: &mut dyn TreeEditor,
    ) -> Result<(), RvcError> {
        let reported_dir = self.reported_node(&reported, path);
        apply_properties(reported_dir.as_deref(), target_dir, |name, value| editor.change_dir_prop(handle, name, value))?;

        let target_children = target_dir.children().cloned().unwrap_or_default();
        let reported_children = reported_dir
            .as_ref()
            .and_then(|n| n.children().cloned())
            .unwrap_or_default();
        let mut names: BTreeSet<RepoPathComponentBuf> = BTreeSet::new();
        names.extend(target_children.keys().cloned());
        names.extend(reported_children.keys().cloned());

        for name in names {
            let child_path = path.join(&name);
            let target_child = target_children.get(&name).cloned();
            let explicit = reported_state(report, &child_path);
            let inherited = reported.as_ref().map(|r| Reported { revision: r.revision, depth: r.depth });
            let child_reported = explicit.or(inherited.filter(|_| reported_children.contains_key(&name)));
            let reported_child = self.reported_node(&child_reported, &child_path).or_else(|| reported_children.get(&name).cloned());

            self.reconcile_entry(report, &child_path, target_child.as_ref(), reported_child, child_reported, handle, editor)?;
        }

        editor.close_directory(handle)
    }

    #[allow(clippy::too_many_arguments)]
    fn reconcile_entry(
        &self,
        report: &Report,
        path: &RepoPath,
        target: Option<&Arc<Node>>,
        reported_node: Option<Arc<Node>>,
        reported: Option<Reported>,
        parent: DirHandle,
        editor: &mut dyn TreeEditor,
    ) -> Result<(), RvcError> {
        match (target, reported_node) {
            (None, None) => Ok(()),
            (None, Some(_)) => editor.delete_entry(path, reported.map(|r| r.revision), parent),
            (Some(target), None) => self.stream_add(path, target, parent, editor),
            (Some(target), Some(reported_node)) => {
                if target.id != reported_node.id {
                    editor.delete_entry(path, reported.map(|r| r.revision), parent)?;
                    self.stream_add(path, target, parent, editor)
                } else if target.kind() != NodeKind::Directory && Arc::ptr_eq(target, &reported_node) {
                    // Same node-id and literally the same committed object: this
                    // node (and, for a file, its content) has not changed since
                    // the client's reported revision. A directory can share its
                    // own node identity with an ancestor-materialized copy even
                    // when a descendant changed underneath it, so directories
                    // always recurse instead of relying on this shortcut.
                    Ok(())
                } else {
                    self.open_and_diff(report, path, target, &reported_node, reported, parent, editor)
                }
            }
        }
    }

    fn stream_add(&self, path: &RepoPath, target: &Arc<Node>, parent: DirHandle, editor: &mut dyn TreeEditor) -> Result<(), RvcError> {
        match &target.payload {
            NodePayload::Directory { .. } => {
                let handle = editor.add_directory(path, parent, None)?;
                self.reconcile_directory(&Report::new(), path, target, None, handle, editor)
            }
            NodePayload::File { key, .. } => {
                let handle = editor.add_file(path, parent, None)?;
                let contents = self.store.objects().get_stream(key)?;
                let windows = diff_to_windows(b"", &contents);
                editor.apply_textdelta(handle, None, &windows)?;
                apply_properties(None, target, |name, value| editor.change_file_prop(handle, name, value))?;
                editor.close_file(handle, Some(checksum_of(target)))
            }
            NodePayload::Symlink { target: link_target } => {
                let handle = editor.add_file(path, parent, None)?;
                let windows = diff_to_windows(b"", crate::wc::Translator::encode_symlink(link_target).as_slice());
                editor.apply_textdelta(handle, None, &windows)?;
                editor.close_file(handle, None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn open_and_diff(
        &self,
        report: &Report,
        path: &RepoPath,
        target: &Arc<Node>,
        reported_node: &Arc<Node>,
        reported: Option<Reported>,
        parent: DirHandle,
        editor: &mut dyn TreeEditor,
    ) -> Result<(), RvcError> {
        let base_revision = reported.map(|r| r.revision).unwrap_or(self.target_revision);
        match (&target.payload, &reported_node.payload) {
            (NodePayload::Directory { .. }, NodePayload::Directory { .. }) => {
                let handle = editor.open_directory(path, parent, base_revision)?;
                let child_reported = reported_state(report, path).or(Some(Reported { revision: base_revision, depth: Depth::Infinity }));
                self.reconcile_directory(report, path, target, child_reported, handle, editor)
            }
            _ => {
                let handle = editor.open_file(path, parent, base_revision)?;
                let base_contents = self.store.read_file(base_revision, path).unwrap_or_default();
                let target_contents = self.store.read_file(self.target_revision, path).unwrap_or_default();
                if base_contents != target_contents {
                    let windows = diff_to_windows(&base_contents, &target_contents);
                    editor.apply_textdelta(handle, Some(checksum_of(reported_node)), &windows)?;
                }
                apply_properties(Some(reported_node), target, |name, value| editor.change_file_prop(handle, name, value))?;
                editor.close_file(handle, Some(checksum_of(target)))
            }
        }
    }
}

fn checksum_of(node: &Node) -> crate::rs::StrongChecksum {
    match &node.payload {
        NodePayload::File { checksum, .. } => checksum.clone(),
        _ => crate::rs::StrongChecksum::from_bytes(Vec::new()),
    }
}

fn apply_properties(reported: Option<&Node>, target: &Node, mut emit: impl FnMut(&str, Option<Vec<u8>>) -> Result<(), RvcError>) -> Result<(), RvcError> {
    let empty = crate::rs::PropTable::new();
    let old = reported.map(|n| &n.properties).unwrap_or(&empty);
    for (name, value) in &target.properties {
        if old.get(name) != Some(value) {
            emit(name, Some(value.clone()))?;
        }
    }
    for name in old.keys() {
        if !target.properties.contains_key(name) {
            emit(name, None)?;
        }
    }
    Ok(())
}
