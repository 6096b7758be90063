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

//! The committed, immutable node tree (§3 Node, Path).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::repo_path::RepoPathComponentBuf;
use crate::rs::checksum::StrongChecksum;
use crate::rs::key_gen::next_key;
use crate::rs::props::PropTable;
use crate::rs::store::ObjectKey;

/// The committed revision number. Revision 0 is always the empty tree.
pub type Revision = u64;

/// Stable identity of a versioned object, independent of path. Generated by
/// the same monotone base-36 counter as object-store keys.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

/// Generates sequential [`NodeId`]s using the `next-key` successor.
#[derive(Debug, Default)]
pub struct NodeIdGenerator {
    last: Option<String>,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a generator that continues after `last_issued`.
    pub fn resume_after(last_issued: &str) -> Self {
        Self {
            last: Some(last_issued.to_string()),
        }
    }

    /// The most recently issued id, for persisting generator state.
    pub fn last_issued(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn next(&mut self) -> NodeId {
        let next = match &self.last {
            None => "1".to_string(),
            Some(last) => next_key(last).expect("generator only ever holds valid keys"),
        };
        self.last = Some(next.clone());
        NodeId(next)
    }
}

/// The kind of a versioned node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

/// A node's type-specific payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodePayload {
    /// `key` names the object-store blob holding the file's bytes; `checksum`
    /// is the integrity check recorded alongside it (and the value the wire
    /// protocol's `base-checksum` negotiation compares against).
    File { checksum: StrongChecksum, key: ObjectKey },
    Directory { children: BTreeMap<RepoPathComponentBuf, Arc<Node>> },
    Symlink { target: String },
}

/// A committed, immutable node. Shared via `Arc` between revisions whose
/// subtree at this path is unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub created_revision: Revision,
    pub properties: PropTable,
    pub payload: NodePayload,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match &self.payload {
            NodePayload::File { .. } => NodeKind::File,
            NodePayload::Directory { .. } => NodeKind::Directory,
            NodePayload::Symlink { .. } => NodeKind::Symlink,
        }
    }

    /// The empty root directory node of revision 0.
    pub fn empty_root(id: NodeId) -> Self {
        Self {
            id,
            created_revision: 0,
            properties: PropTable::new(),
            payload: NodePayload::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<RepoPathComponentBuf, Arc<Node>>> {
        match &self.payload {
            NodePayload::Directory { children } => Some(children),
            _ => None,
        }
    }
}

// `StrongChecksum` needs (de)serialization to live inside a `Node`.
impl Serialize for StrongChecksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for StrongChecksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid checksum hex"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_generator_yields_sequential_keys() {
        let mut gen = NodeIdGenerator::new();
        assert_eq!(gen.next().0, "1");
        assert_eq!(gen.next().0, "2");
    }

    #[test]
    fn node_id_generator_resumes_after_a_checkpoint() {
        let mut gen = NodeIdGenerator::resume_after("9");
        assert_eq!(gen.next().0, "a");
    }
}
