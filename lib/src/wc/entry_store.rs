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

//! The entry metadata store (C2a): read-entry, read-children, write-entry,
//! walk-entries, sync.
//!
//! Entries are kept in memory as a sorted map keyed by repository-relative
//! path and persisted as one JSON document, written atomically (temp file,
//! fsync, rename) on every [`EntryStore::sync`].

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathBuf;
use crate::wc::entry::WcEntry;

/// The in-memory, disk-backed table of working-copy entries.
pub struct EntryStore {
    db_path: PathBuf,
    entries: BTreeMap<RepoPathBuf, WcEntry>,
}

impl EntryStore {
    /// Opens the entry database at `db_path`, or starts an empty one if it
    /// does not exist yet.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, RvcError> {
        let db_path = db_path.into();
        let entries = match std::fs::read(&db_path) {
            Ok(bytes) => deserialize(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(RvcError::io(db_path, e)),
        };
        Ok(Self { db_path, entries })
    }

    pub fn read_entry(&self, path: &RepoPath) -> Option<&WcEntry> {
        self.entries.get(path)
    }

    /// Entries immediately below `path` (not recursive).
    pub fn read_children<'a>(&'a self, path: &'a RepoPath) -> impl Iterator<Item = (&'a RepoPathBuf, &'a WcEntry)> {
        self.entries
            .iter()
            .filter(move |(p, _)| p.parent() == Some(path))
    }

    pub fn write_entry(&mut self, path: RepoPathBuf, entry: WcEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove_entry(&mut self, path: &RepoPath) -> Option<WcEntry> {
        self.entries.remove(path)
    }

    /// All entries, in path order.
    pub fn walk_entries(&self) -> impl Iterator<Item = (&RepoPathBuf, &WcEntry)> {
        self.entries.iter()
    }

    /// Persists the current in-memory state to disk.
    pub fn sync(&self) -> Result<(), RvcError> {
        let bytes = serialize(&self.entries);
        let dir = self.db_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RvcError::io(self.db_path.clone(), e))?;
        temp.write_all(&bytes).map_err(|e| RvcError::io(self.db_path.clone(), e))?;
        crate::file_util::persist_temp_file(temp, &self.db_path).map_err(|e| RvcError::io(self.db_path.clone(), e))?;
        Ok(())
    }
}

fn serialize(entries: &BTreeMap<RepoPathBuf, WcEntry>) -> Vec<u8> {
    let as_strings: BTreeMap<String, &WcEntry> = entries
        .iter()
        .map(|(path, entry)| (path.as_internal_file_string().to_string(), entry))
        .collect();
    serde_json::to_vec_pretty(&as_strings).expect("WcEntry serialization cannot fail")
}

fn deserialize(bytes: &[u8]) -> Result<BTreeMap<RepoPathBuf, WcEntry>, RvcError> {
    let as_strings: BTreeMap<String, WcEntry> = serde_json::from_slice(bytes)
        .map_err(|e| RvcError::tagged_with_source(crate::error::ErrorKind::MalformedFile, "malformed entry database", e))?;
    as_strings
        .into_iter()
        .map(|(path, entry)| {
            RepoPathBuf::from_internal_string(path)
                .map(|path| (path, entry))
                .map_err(|e| RvcError::tagged_with_source(crate::error::ErrorKind::MalformedFile, "invalid path in entry database", e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rs::NodeKind;

    #[test]
    fn an_entry_survives_a_sync_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("entries.json");
        let path = RepoPathBuf::from_internal_string("foo.txt").unwrap();
        {
            let mut store = EntryStore::open(&db_path).unwrap();
            store.write_entry(path.clone(), WcEntry::normal(NodeKind::File, 1));
            store.sync().unwrap();
        }
        let store = EntryStore::open(&db_path).unwrap();
        assert!(store.read_entry(&path).is_some());
    }

    #[test]
    fn opening_a_missing_database_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::open(dir.path().join("nope.json")).unwrap();
        assert_eq!(store.walk_entries().count(), 0);
    }

    #[test]
    fn read_children_is_one_level_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EntryStore::open(dir.path().join("entries.json")).unwrap();
        store.write_entry(
            RepoPathBuf::from_internal_string("a").unwrap(),
            WcEntry::normal(NodeKind::Directory, 1),
        );
        store.write_entry(
            RepoPathBuf::from_internal_string("a/b.txt").unwrap(),
            WcEntry::normal(NodeKind::File, 1),
        );
        store.write_entry(
            RepoPathBuf::from_internal_string("a/b/c.txt").unwrap(),
            WcEntry::normal(NodeKind::File, 1),
        );
        let children: Vec<_> = store
            .read_children(RepoPath::from_internal_string("a").unwrap())
            .map(|(p, _)| p.as_internal_file_string().to_string())
            .collect();
        assert_eq!(children, vec!["a/b.txt".to_string()]);
    }
}
