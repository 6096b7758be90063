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

//! The object store (C1a): a persistently-keyed map from opaque keys to byte
//! streams, plus the property table attached to each key.
//!
//! Keys are generated by [`next_key`] and never reused. Blobs are written
//! atomically (temp file, fsync, rename) so a crash mid-write can never leave
//! a key pointing at a half-written file.

use std::path::Path;
use std::path::PathBuf;

use crate::error::RvcError;
use crate::file_util;
use crate::rs::checksum::Checksums;
use crate::rs::checksum::checksum_bytes;
use crate::rs::key_gen::next_key;
use crate::rs::props::PropTable;
use crate::rs::props::parse_props;
use crate::rs::props::serialize_props;

/// An opaque, monotonically increasing object-store key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjectKey(pub String);

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content-addressed store of blobs and their property tables, rooted at a
/// directory on disk.
///
/// `db/` holds one file per key (the blob bytes); `props/` holds one file per
/// key (the serialized property table, written only when non-empty).
pub struct ObjectStore {
    root: PathBuf,
    last_key: Option<String>,
}

impl ObjectStore {
    /// Opens (creating if necessary) an object store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RvcError> {
        let root = root.into();
        file_util::create_or_reuse_dir(&root.join("db")).map_err(|e| RvcError::io(root.clone(), e))?;
        file_util::create_or_reuse_dir(&root.join("props")).map_err(|e| RvcError::io(root.clone(), e))?;
        let last_key = read_last_key(&root)?;
        Ok(Self { root, last_key })
    }

    fn allocate_key(&mut self) -> ObjectKey {
        let key = match &self.last_key {
            None => "1".to_string(),
            Some(last) => next_key(last).expect("object store only ever holds valid keys"),
        };
        self.last_key = Some(key.clone());
        ObjectKey(key)
    }

    fn blob_path(&self, key: &ObjectKey) -> PathBuf {
        self.root.join("db").join(&key.0)
    }

    fn props_path(&self, key: &ObjectKey) -> PathBuf {
        self.root.join("props").join(&key.0)
    }

    /// Writes `data` under a freshly allocated key and returns both the key
    /// and its checksums.
    pub fn put_stream(&mut self, data: &[u8]) -> Result<(ObjectKey, Checksums), RvcError> {
        let key = self.allocate_key();
        let path = self.blob_path(&key);
        write_atomically(&self.root.join("db"), &path, data)?;
        persist_last_key(&self.root, &key.0)?;
        Ok((key, checksum_bytes(data)))
    }

    /// Reads back the bytes written under `key`.
    pub fn get_stream(&self, key: &ObjectKey) -> Result<Vec<u8>, RvcError> {
        let path = self.blob_path(key);
        std::fs::read(&path).map_err(|source| RvcError::io(path, source))
    }

    /// Attaches a property table to `key`, replacing any previous one.
    pub fn put_props(&mut self, key: &ObjectKey, props: &PropTable) -> Result<(), RvcError> {
        let path = self.props_path(key);
        if props.is_empty() {
            let _ = std::fs::remove_file(&path);
            return Ok(());
        }
        let bytes = serialize_props(props);
        write_atomically(&self.root.join("props"), &path, &bytes)?;
        Ok(())
    }

    /// Reads the property table attached to `key`, or an empty table if none
    /// was ever written.
    pub fn get_props(&self, key: &ObjectKey) -> Result<PropTable, RvcError> {
        let path = self.props_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => parse_props(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PropTable::new()),
            Err(e) => Err(RvcError::io(path, e)),
        }
    }
}

/// Writes `data` to `dest` via a temp file in `dir`, fsync, then atomic
/// rename, overwriting whatever was previously at `dest`.
fn write_atomically(dir: &Path, dest: &Path, data: &[u8]) -> Result<(), RvcError> {
    use std::io::Write as _;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RvcError::io(dest.to_path_buf(), e))?;
    temp.write_all(data).map_err(|e| RvcError::io(dest.to_path_buf(), e))?;
    file_util::persist_content_addressed_temp_file(temp, dest)
        .map_err(|e| RvcError::io(dest.to_path_buf(), e))?;
    Ok(())
}

fn last_key_path(root: &Path) -> PathBuf {
    root.join("next-key")
}

fn read_last_key(root: &Path) -> Result<Option<String>, RvcError> {
    match std::fs::read_to_string(last_key_path(root)) {
        Ok(contents) => Ok(Some(contents.trim().to_string()).filter(|s| !s.is_empty())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RvcError::io(last_key_path(root), e)),
    }
}

fn persist_last_key(root: &Path, key: &str) -> Result<(), RvcError> {
    write_atomically(root, &last_key_path(root), key.as_bytes())
}
