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

//! The revision store (C1): the committed sequence of revisions, each a
//! snapshot root [`Node`], plus the transaction manager's view of which
//! node-ids have been touched since which revision.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::error::RvcError;
use crate::file_util;
use crate::rs::props::PropTable;
use crate::rs::store::ObjectStore;
use crate::rs::transaction::Transaction;
use crate::rs::tree::Node;
use crate::rs::tree::NodeId;
use crate::rs::tree::NodeIdGenerator;
use crate::rs::tree::Revision;

/// A committed revision: its root node and its revision properties (the
/// reserved `rvc:log`, `rvc:author`, `rvc:date`, plus any custom revprops).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommittedRevision {
    pub root: Arc<Node>,
    pub revprops: PropTable,
}

/// The on-disk shape of everything in [`RevisionStore`] that isn't already
/// durable through the object store: the revision history, the node-id
/// generator's cursor, and the out-of-date-detection map. Written as one
/// JSON document, same shape as `wc/entry_store.rs`'s entry database.
#[derive(Serialize, Deserialize)]
struct PersistedHistory {
    revisions: Vec<CommittedRevision>,
    last_modified: HashMap<NodeId, Revision>,
    last_node_id: Option<String>,
}

/// The top-level handle on a repository: the blob/props object store, the
/// committed revision history, and node-id bookkeeping for out-of-date
/// detection.
///
/// Out-of-date detection is by **node-id identity plus modification
/// revision**, not by path: two transactions that edit the same path via
/// unrelated node-ids (e.g. one deleted and recreated the path) do not
/// conflict, but one that edits a node-id another transaction already
/// committed a newer revision of, does.
pub struct RevisionStore {
    root: PathBuf,
    uuid: Uuid,
    objects: ObjectStore,
    revisions: Vec<CommittedRevision>,
    node_ids: NodeIdGenerator,
    /// The revision in which each node-id was last modified (content,
    /// properties, or — for directories — child set).
    last_modified: HashMap<NodeId, Revision>,
}

impl RevisionStore {
    /// Creates a brand-new repository at `root`, with revision 0 the empty
    /// tree, and persists its metadata.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn create(root: impl AsRef<Path>) -> Result<Self, RvcError> {
        let root = root.as_ref().to_path_buf();
        file_util::create_or_reuse_dir(&root).map_err(|e| RvcError::io(root.clone(), e))?;
        let objects = ObjectStore::open(root.join("objects"))?;
        let uuid = Uuid::new_v4();
        let mut node_ids = NodeIdGenerator::new();
        let root_id = node_ids.next();
        let root_node = Arc::new(Node::empty_root(root_id.clone()));
        let mut last_modified = HashMap::new();
        last_modified.insert(root_id, 0);
        let store = Self {
            root,
            uuid,
            objects,
            revisions: vec![CommittedRevision {
                root: root_node,
                revprops: PropTable::new(),
            }],
            node_ids,
            last_modified,
        };
        store.persist_metadata()?;
        store.persist_history()?;
        tracing::info!(uuid = %store.uuid, "created repository");
        Ok(store)
    }

    /// Reopens a repository previously created with [`Self::create`].
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RvcError> {
        let root = root.as_ref().to_path_buf();
        let uuid_path = root.join("uuid");
        let uuid_text = std::fs::read_to_string(&uuid_path).map_err(|e| RvcError::io(uuid_path.clone(), e))?;
        let uuid = Uuid::parse_str(uuid_text.trim())
            .map_err(|e| RvcError::tagged_with_source(ErrorKind::MalformedFile, "malformed repository uuid", e))?;
        let objects = ObjectStore::open(root.join("objects"))?;
        let history_path = history_path(&root);
        let bytes = std::fs::read(&history_path).map_err(|e| RvcError::io(history_path.clone(), e))?;
        let history: PersistedHistory = serde_json::from_slice(&bytes)
            .map_err(|e| RvcError::tagged_with_source(ErrorKind::MalformedFile, "malformed revision history", e))?;
        let node_ids = match &history.last_node_id {
            Some(last) => NodeIdGenerator::resume_after(last),
            None => NodeIdGenerator::new(),
        };
        tracing::info!(uuid = %uuid, youngest = history.revisions.len().saturating_sub(1), "opened repository");
        Ok(Self {
            root,
            uuid,
            objects,
            revisions: history.revisions,
            node_ids,
            last_modified: history.last_modified,
        })
    }

    fn persist_metadata(&self) -> Result<(), RvcError> {
        let path = self.root.join("uuid");
        std::fs::write(&path, self.uuid.to_string()).map_err(|e| RvcError::io(path, e))
    }

    /// Persists the revision history, out-of-date map, and node-id cursor,
    /// atomically (temp file, fsync, rename), same discipline as the object
    /// store's blob writes.
    fn persist_history(&self) -> Result<(), RvcError> {
        let path = history_path(&self.root);
        let history = PersistedHistory {
            revisions: self.revisions.clone(),
            last_modified: self.last_modified.clone(),
            last_node_id: self.node_ids.last_issued().map(str::to_owned),
        };
        let bytes = serde_json::to_vec_pretty(&history)
            .map_err(|e| RvcError::tagged_with_source(ErrorKind::MalformedFile, "failed to serialize revision history", e))?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.root).map_err(|e| RvcError::io(path.clone(), e))?;
        temp.write_all(&bytes).map_err(|e| RvcError::io(path.clone(), e))?;
        file_util::persist_temp_file(temp, &path).map_err(|e| RvcError::io(path, e))
    }

    /// The youngest (most recently committed) revision number.
    pub fn youngest(&self) -> Revision {
        (self.revisions.len() - 1) as Revision
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The root node of `revision`, or [`ErrorKind::BadRevision`] if it does
    /// not exist.
    pub fn root(&self, revision: Revision) -> Result<Arc<Node>, RvcError> {
        self.revisions
            .get(revision as usize)
            .map(|r| r.root.clone())
            .ok_or_else(|| RvcError::tagged(ErrorKind::BadRevision, format!("no such revision: {revision}")))
    }

    pub fn revprops(&self, revision: Revision) -> Result<PropTable, RvcError> {
        self.revisions
            .get(revision as usize)
            .map(|r| r.revprops.clone())
            .ok_or_else(|| RvcError::tagged(ErrorKind::BadRevision, format!("no such revision: {revision}")))
    }

    pub(crate) fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Sets or clears a revision property on an already-committed revision
    /// (`change-rev-prop`, §6). Unlike everything else in the store, this
    /// mutates committed history in place rather than producing a new
    /// revision — revprops are explicitly unversioned metadata.
    pub fn set_revprop(&mut self, revision: Revision, name: &str, value: Option<Vec<u8>>) -> Result<(), RvcError> {
        let entry = self
            .revisions
            .get_mut(revision as usize)
            .ok_or_else(|| RvcError::tagged(ErrorKind::BadRevision, format!("no such revision: {revision}")))?;
        match value {
            Some(value) => {
                entry.revprops.insert(name.to_string(), value);
            }
            None => {
                entry.revprops.remove(name);
            }
        }
        self.persist_history()
    }

    /// Looks up the node at `path` as of `revision`.
    pub fn node_at(&self, revision: Revision, path: &crate::repo_path::RepoPath) -> Result<Arc<Node>, RvcError> {
        let mut current = self.root(revision)?;
        for component in path.components() {
            let children = current
                .children()
                .ok_or_else(|| RvcError::PathNotFound { path: path.to_owned() })?;
            let child = children
                .get(component)
                .ok_or_else(|| RvcError::PathNotFound { path: path.to_owned() })?;
            current = child.clone();
        }
        Ok(current)
    }

    /// Reads the full byte content of the file at `path` as of `revision`.
    pub fn read_file(&self, revision: Revision, path: &crate::repo_path::RepoPath) -> Result<Vec<u8>, RvcError> {
        let node = self.node_at(revision, path)?;
        match &node.payload {
            crate::rs::tree::NodePayload::File { key, .. } => self.objects.get_stream(key),
            _ => Err(RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: not a file", path.as_internal_file_string()))),
        }
    }

    pub(crate) fn objects_mut(&mut self) -> &mut ObjectStore {
        &mut self.objects
    }

    pub(crate) fn last_modified(&self, id: &NodeId) -> Option<Revision> {
        self.last_modified.get(id).copied()
    }

    pub(crate) fn next_node_id(&mut self) -> NodeId {
        self.node_ids.next()
    }

    /// Begins a new transaction based on the current youngest revision.
    pub fn begin_txn(&mut self) -> Transaction<'_> {
        let base_revision = self.youngest();
        let base_root = self.root(base_revision).expect("youngest revision always exists");
        Transaction::new(self, base_revision, base_root)
    }

    /// Commits `txn`, returning the new revision number. Called by
    /// [`Transaction::commit`]; not part of the public API.
    pub(crate) fn finalize_commit(
        &mut self,
        new_root: Arc<Node>,
        revprops: PropTable,
        touched: &[(NodeId, Revision)],
    ) -> Result<Revision, RvcError> {
        let new_revision = self.revisions.len() as Revision;
        for (id, _) in touched {
            self.last_modified.insert(id.clone(), new_revision);
        }
        self.revisions.push(CommittedRevision {
            root: new_root,
            revprops,
        });
        self.persist_history()?;
        Ok(new_revision)
    }
}

fn history_path(root: &Path) -> PathBuf {
    root.join("revisions.json")
}
