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

//! The transaction manager (C1b): a copy-on-write overlay on top of a base
//! revision's tree.
//!
//! Each node visited during the transaction is materialized lazily: an
//! untouched subtree stays a cheap [`Arc`] clone of the committed node, and
//! only the path actually walked is copied into a mutable [`PendingNode`].
//! Commit recurses over the overlay, reusing untouched `Arc`s and minting new
//! revisions only for nodes that were actually modified.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use crate::error::ErrorKind;
use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathComponentBuf;
use crate::rs::checksum::StrongChecksum;
use crate::rs::props::PropTable;
use crate::rs::repo::RevisionStore;
use crate::rs::store::ObjectKey;
use crate::rs::tree::Node;
use crate::rs::tree::NodeId;
use crate::rs::tree::NodeKind;
use crate::rs::tree::NodePayload;
use crate::rs::tree::Revision;

/// A child slot in the pending overlay: either untouched (shared with the
/// base revision) or materialized for editing.
enum TxnChild {
    Base(Arc<Node>),
    Pending(PendingNode),
}

impl TxnChild {
    fn id(&self) -> &NodeId {
        match self {
            Self::Base(node) => &node.id,
            Self::Pending(node) => &node.id,
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Self::Base(node) => node.kind(),
            Self::Pending(node) => node.kind(),
        }
    }
}

/// A node materialized into the transaction's overlay for editing.
struct PendingNode {
    id: NodeId,
    /// `created_revision` of the base node this was copied from, or the
    /// current commit-in-progress if this is brand new. Used to preserve the
    /// revision of nodes touched only by COW descent, not by an actual edit.
    base_created_revision: Revision,
    /// True once this node's own content/properties/child-set have changed.
    self_modified: bool,
    is_new: bool,
    properties: PropTable,
    payload: PendingPayload,
}

enum PendingPayload {
    File { checksum: StrongChecksum, key: ObjectKey },
    Directory { children: BTreeMap<RepoPathComponentBuf, TxnChild> },
    Symlink { target: String },
}

impl PendingNode {
    fn kind(&self) -> NodeKind {
        match &self.payload {
            PendingPayload::File { .. } => NodeKind::File,
            PendingPayload::Directory { .. } => NodeKind::Directory,
            PendingPayload::Symlink { .. } => NodeKind::Symlink,
        }
    }

    fn from_base(node: &Arc<Node>) -> Self {
        let payload = match &node.payload {
            NodePayload::File { checksum, key } => PendingPayload::File {
                checksum: checksum.clone(),
                key: key.clone(),
            },
            NodePayload::Directory { children } => PendingPayload::Directory {
                children: children
                    .iter()
                    .map(|(name, child)| (name.clone(), TxnChild::Base(child.clone())))
                    .collect(),
            },
            NodePayload::Symlink { target } => PendingPayload::Symlink {
                target: target.clone(),
            },
        };
        Self {
            id: node.id.clone(),
            base_created_revision: node.created_revision,
            self_modified: false,
            is_new: false,
            properties: node.properties.clone(),
            payload,
        }
    }

    fn new_file(id: NodeId, checksum: StrongChecksum, key: ObjectKey, new_revision: Revision) -> Self {
        Self {
            id,
            base_created_revision: new_revision,
            self_modified: true,
            is_new: true,
            properties: PropTable::new(),
            payload: PendingPayload::File { checksum, key },
        }
    }

    fn new_directory(id: NodeId, new_revision: Revision) -> Self {
        Self {
            id,
            base_created_revision: new_revision,
            self_modified: true,
            is_new: true,
            properties: PropTable::new(),
            payload: PendingPayload::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    fn new_symlink(id: NodeId, target: String, new_revision: Revision) -> Self {
        Self {
            id,
            base_created_revision: new_revision,
            self_modified: true,
            is_new: true,
            properties: PropTable::new(),
            payload: PendingPayload::Symlink { target },
        }
    }

    fn children_mut(&mut self) -> Result<&mut BTreeMap<RepoPathComponentBuf, TxnChild>, RvcError> {
        match &mut self.payload {
            PendingPayload::Directory { children } => Ok(children),
            _ => Err(not_a_directory()),
        }
    }

    fn children(&self) -> Result<&BTreeMap<RepoPathComponentBuf, TxnChild>, RvcError> {
        match &self.payload {
            PendingPayload::Directory { children } => Ok(children),
            _ => Err(not_a_directory()),
        }
    }
}

fn not_a_directory() -> RvcError {
    RvcError::tagged(ErrorKind::IncorrectParams, "not a directory")
}

/// A single in-progress transaction. Changes are only visible to readers that
/// hold this handle, and only take effect repository-wide on [`commit`].
///
/// [`commit`]: Transaction::commit
pub struct Transaction<'repo> {
    store: &'repo mut RevisionStore,
    base_revision: Revision,
    root: PendingNode,
    /// Node-ids that existed in the base revision and were touched by this
    /// transaction, paired with the path they were touched at (for
    /// diagnostics). Used to detect out-of-date conflicts at commit time.
    touched: Vec<(NodeId, Revision, crate::repo_path::RepoPathBuf)>,
}

impl<'repo> Transaction<'repo> {
    pub(crate) fn new(store: &'repo mut RevisionStore, base_revision: Revision, base_root: Arc<Node>) -> Self {
        let root = PendingNode::from_base(&base_root);
        Self {
            store,
            base_revision,
            root,
            touched: Vec::new(),
        }
    }

    pub fn base_revision(&self) -> Revision {
        self.base_revision
    }

    /// Reads a file's content as committed at `revision`, for adapters that
    /// need base text (e.g. opening a file for a text-delta edit) without
    /// holding their own borrow of the store alongside the transaction's.
    pub(crate) fn read_committed_file(&self, revision: Revision, path: &RepoPath) -> Result<Vec<u8>, RvcError> {
        self.store.read_file(revision, path)
    }

    /// Opens the directory at `path`, materializing every ancestor along the
    /// way, without marking any of them as self-modified.
    fn open_dir_mut(&mut self, path: &RepoPath) -> Result<&mut PendingNode, RvcError> {
        let mut current = &mut self.root;
        for component in path.components() {
            let children = current.children_mut()?;
            let slot = children
                .get_mut(component)
                .ok_or_else(|| path_not_found(path))?;
            materialize(slot);
            let TxnChild::Pending(child) = slot else {
                unreachable!("materialize always produces Pending")
            };
            if child.kind() != NodeKind::Directory {
                return Err(RvcError::tagged(
                    ErrorKind::IncorrectParams,
                    format!("{}: not a directory", path.as_internal_file_string()),
                ));
            }
            current = child;
        }
        Ok(current)
    }

    fn record_touch_if_preexisting(&mut self, id: &NodeId, is_new: bool, base_created_revision: Revision, path: &RepoPath) {
        if !is_new {
            self.touched.push((id.clone(), base_created_revision, path.to_owned()));
        }
    }

    /// Creates a new, empty file at `path`. The parent directory must exist.
    pub fn make_file(&mut self, path: &RepoPath) -> Result<(), RvcError> {
        let (key, checksums) = self.store.objects_mut().put_stream(b"")?;
        self.add_entry(path, move |id, new_revision| PendingNode::new_file(id, checksums.strong, key, new_revision))
    }

    /// Creates a new, empty directory at `path`. The parent directory must
    /// exist.
    pub fn make_dir(&mut self, path: &RepoPath) -> Result<(), RvcError> {
        self.add_entry(path, PendingNode::new_directory)
    }

    /// Creates a symlink at `path` pointing at `target`.
    pub fn make_symlink(&mut self, path: &RepoPath, target: impl Into<String>) -> Result<(), RvcError> {
        let target = target.into();
        self.add_entry(path, move |id, new_revision| PendingNode::new_symlink(id, target, new_revision))
    }

    fn add_entry(
        &mut self,
        path: &RepoPath,
        make: impl FnOnce(NodeId, Revision) -> PendingNode,
    ) -> Result<(), RvcError> {
        let Some((parent, name)) = path.split() else {
            return Err(RvcError::tagged(ErrorKind::IncorrectParams, "cannot replace the root"));
        };
        let new_revision = self.base_revision + 1;
        let id = self.store.next_node_id();
        let parent = self.open_dir_mut(parent)?;
        let children = parent.children_mut()?;
        if children.contains_key(name) {
            return Err(RvcError::AlreadyExists { path: path.to_owned() });
        }
        children.insert(name.to_owned(), TxnChild::Pending(make(id, new_revision)));
        parent.self_modified = true;
        Ok(())
    }

    /// Deletes the entry at `path`.
    pub fn delete(&mut self, path: &RepoPath) -> Result<(), RvcError> {
        let Some((parent, name)) = path.split() else {
            return Err(RvcError::tagged(ErrorKind::IncorrectParams, "cannot delete the root"));
        };
        let parent = self.open_dir_mut(parent)?;
        let children = parent.children_mut()?;
        let removed = children.remove(name).ok_or_else(|| path_not_found(path))?;
        parent.self_modified = true;
        let (id, is_new, base_created_revision) = match removed {
            TxnChild::Base(node) => (node.id.clone(), false, node.created_revision),
            TxnChild::Pending(node) => (node.id.clone(), node.is_new, node.base_created_revision),
        };
        self.record_touch_if_preexisting(&id, is_new, base_created_revision, path);
        Ok(())
    }

    /// Copies the subtree at `src` (as of `src_revision`) to `dst`. The
    /// copy's node-ids are preserved, so history that cares about "same line
    /// of descent across a rename" can follow them.
    pub fn copy(&mut self, src: &RepoPath, src_revision: Revision, dst: &RepoPath) -> Result<(), RvcError> {
        let src_node = self.store.root(src_revision)?;
        let src_node = lookup(&src_node, src)?;
        let Some((parent, name)) = dst.split() else {
            return Err(RvcError::tagged(ErrorKind::IncorrectParams, "cannot replace the root"));
        };
        let parent = self.open_dir_mut(parent)?;
        let children = parent.children_mut()?;
        if children.contains_key(name) {
            return Err(RvcError::AlreadyExists { path: dst.to_owned() });
        }
        children.insert(name.to_owned(), TxnChild::Base(src_node));
        parent.self_modified = true;
        Ok(())
    }

    /// Overwrites the content of the file at `path`, recomputing its
    /// checksum through the object store.
    pub fn write_contents(&mut self, path: &RepoPath, data: &[u8]) -> Result<(), RvcError> {
        let (key, checksums) = self.store.objects_mut().put_stream(data)?;
        let Some((parent, name)) = path.split() else {
            return Err(RvcError::tagged(ErrorKind::IncorrectParams, "cannot write to the root"));
        };
        let parent = self.open_dir_mut(parent)?;
        let children = parent.children_mut()?;
        let slot = children.get_mut(name).ok_or_else(|| path_not_found(path))?;
        materialize(slot);
        let TxnChild::Pending(node) = slot else {
            unreachable!()
        };
        if node.kind() != NodeKind::File {
            return Err(RvcError::tagged(
                ErrorKind::IncorrectParams,
                format!("{}: not a file", path.as_internal_file_string()),
            ));
        }
        let id = node.id.clone();
        let is_new = node.is_new;
        let base_created_revision = node.base_created_revision;
        node.payload = PendingPayload::File {
            checksum: checksums.strong,
            key,
        };
        node.self_modified = true;
        self.record_touch_if_preexisting(&id, is_new, base_created_revision, path);
        Ok(())
    }

    /// Sets or removes (when `value` is `None`) a property on the node at
    /// `path`.
    pub fn set_prop(&mut self, path: &RepoPath, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError> {
        let node = if path.is_root() {
            &mut self.root
        } else {
            let Some((parent, basename)) = path.split() else {
                unreachable!("non-root path always splits")
            };
            let parent = self.open_dir_mut(parent)?;
            let children = parent.children_mut()?;
            let slot = children.get_mut(basename).ok_or_else(|| path_not_found(path))?;
            materialize(slot);
            let TxnChild::Pending(node) = slot else {
                unreachable!()
            };
            node
        };
        match value {
            Some(value) => {
                node.properties.insert(name.to_string(), value);
            }
            None => {
                node.properties.remove(name);
            }
        }
        let id = node.id.clone();
        let is_new = node.is_new;
        let base_created_revision = node.base_created_revision;
        node.self_modified = true;
        self.record_touch_if_preexisting(&id, is_new, base_created_revision, path);
        Ok(())
    }

    /// Aborts the transaction, discarding all pending changes.
    pub fn abort(self) {}

    /// Commits the transaction, failing with [`ErrorKind::OutOfDate`] if any
    /// node this transaction touched has been modified by a revision
    /// committed after this transaction's base.
    #[instrument(skip_all, fields(base_revision = self.base_revision))]
    pub fn commit(self, revprops: PropTable) -> Result<Revision, RvcError> {
        for (id, _, path) in &self.touched {
            if let Some(last_modified) = self.store.last_modified(id)
                && last_modified > self.base_revision
            {
                return Err(RvcError::OutOfDate { path: path.clone() });
            }
        }

        let new_revision = self.base_revision + 1;
        let mut touched_ids = Vec::new();
        let root = self.root;
        let new_root = finalize(root, new_revision, &mut touched_ids);
        let committed = self.store.finalize_commit(Arc::new(new_root), revprops, &touched_ids)?;
        debug_assert_eq!(committed, new_revision);
        tracing::info!(revision = committed, "committed transaction");
        Ok(committed)
    }
}

/// Converts `slot` in place from `Base` to `Pending`, if it isn't already.
fn materialize(slot: &mut TxnChild) {
    if let TxnChild::Base(node) = slot {
        *slot = TxnChild::Pending(PendingNode::from_base(node));
    }
}

fn finalize(node: PendingNode, new_revision: Revision, touched_ids: &mut Vec<(NodeId, Revision)>) -> Node {
    let created_revision = if node.self_modified {
        touched_ids.push((node.id.clone(), new_revision));
        new_revision
    } else {
        node.base_created_revision
    };
    let payload = match node.payload {
        PendingPayload::File { checksum, key } => NodePayload::File { checksum, key },
        PendingPayload::Symlink { target } => NodePayload::Symlink { target },
        PendingPayload::Directory { children } => {
            let children = children
                .into_iter()
                .map(|(name, child)| {
                    let node = match child {
                        TxnChild::Base(arc) => arc,
                        TxnChild::Pending(pending) => Arc::new(finalize(pending, new_revision, touched_ids)),
                    };
                    (name, node)
                })
                .collect();
            NodePayload::Directory { children }
        }
    };
    Node {
        id: node.id,
        created_revision,
        properties: node.properties,
        payload,
    }
}

fn path_not_found(path: &RepoPath) -> RvcError {
    RvcError::PathNotFound { path: path.to_owned() }
}

fn lookup(root: &Arc<Node>, path: &RepoPath) -> Result<Arc<Node>, RvcError> {
    let mut current = root.clone();
    for component in path.components() {
        let children = current.children().ok_or_else(|| path_not_found(path))?;
        let child = children.get(component).ok_or_else(|| path_not_found(path))?;
        current = child.clone();
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_path::RepoPath as Rp;
    use crate::rs::repo::RevisionStore;

    fn repo() -> (tempfile::TempDir, RevisionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RevisionStore::create(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn committing_a_new_file_advances_the_revision() {
        let (_dir, mut store) = repo();
        let mut txn = store.begin_txn();
        txn.make_file(Rp::from_internal_string("foo.txt").unwrap()).unwrap();
        txn.write_contents(Rp::from_internal_string("foo.txt").unwrap(), b"hello").unwrap();
        let rev = txn.commit(PropTable::new()).unwrap();
        assert_eq!(rev, 1);
        assert_eq!(store.youngest(), 1);
        let root = store.root(1).unwrap();
        assert_eq!(root.children().unwrap().len(), 1);
    }

    #[test]
    fn untouched_subtrees_are_shared_between_revisions() {
        let (_dir, mut store) = repo();
        let mut txn = store.begin_txn();
        txn.make_dir(Rp::from_internal_string("a").unwrap()).unwrap();
        txn.make_dir(Rp::from_internal_string("b").unwrap()).unwrap();
        txn.commit(PropTable::new()).unwrap();

        let mut txn = store.begin_txn();
        txn.set_prop(Rp::from_internal_string("a").unwrap(), "k", Some(b"v".to_vec()))
            .unwrap();
        txn.commit(PropTable::new()).unwrap();

        let rev1_b = store.root(1).unwrap().children().unwrap()[&RepoPathComponentBuf::new("b").unwrap()].clone();
        let rev2_b = store.root(2).unwrap().children().unwrap()[&RepoPathComponentBuf::new("b").unwrap()].clone();
        assert!(Arc::ptr_eq(&rev1_b, &rev2_b));
    }

    #[test]
    fn a_property_only_commit_leaves_tree_content_otherwise_equal() {
        let (_dir, mut store) = repo();
        let mut txn = store.begin_txn();
        txn.make_file(Rp::from_internal_string("foo.txt").unwrap()).unwrap();
        txn.commit(PropTable::new()).unwrap();

        let mut txn = store.begin_txn();
        txn.set_prop(Rp::root(), "k", Some(b"v".to_vec())).unwrap();
        let rev = txn.commit(PropTable::new()).unwrap();

        let before = store.root(rev - 1).unwrap();
        let after = store.root(rev).unwrap();
        assert_eq!(before.children().unwrap().keys().collect::<Vec<_>>(), after.children().unwrap().keys().collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_edits_of_the_same_node_id_are_rejected_as_out_of_date() {
        let (_dir, mut store) = repo();
        let mut txn = store.begin_txn();
        txn.make_file(Rp::from_internal_string("foo.txt").unwrap()).unwrap();
        txn.commit(PropTable::new()).unwrap();

        let mut txn_a = store.begin_txn();
        txn_a
            .write_contents(Rp::from_internal_string("foo.txt").unwrap(), b"from a")
            .unwrap();

        let mut txn_b = store.begin_txn();
        txn_b
            .write_contents(Rp::from_internal_string("foo.txt").unwrap(), b"from b")
            .unwrap();
        txn_b.commit(PropTable::new()).unwrap();

        let err = txn_a.commit(PropTable::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfDate);
    }

    #[test]
    fn deleting_a_path_and_recreating_it_elsewhere_does_not_conflict() {
        let (_dir, mut store) = repo();
        let mut txn = store.begin_txn();
        txn.make_file(Rp::from_internal_string("foo.txt").unwrap()).unwrap();
        txn.commit(PropTable::new()).unwrap();

        let mut txn_a = store.begin_txn();
        txn_a.delete(Rp::from_internal_string("foo.txt").unwrap()).unwrap();

        let mut txn_b = store.begin_txn();
        txn_b.make_file(Rp::from_internal_string("bar.txt").unwrap()).unwrap();
        txn_b.commit(PropTable::new()).unwrap();

        txn_a.commit(PropTable::new()).unwrap();
    }
}
