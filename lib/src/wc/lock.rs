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

//! The per-working-copy advisory lock (§5 "Working-copy concurrency").
//!
//! At most one process may mutate the entry metadata store, pristine store,
//! or work queue at a time; concurrent readers may coexist. Acquiring the
//! lock while already held by the same process must succeed, so a mutating
//! operation that calls into another mutating operation (e.g. `revert`
//! driving the work queue, which itself wants the lock) doesn't deadlock
//! itself.
//!
//! Reentrancy is tracked per-process via a static table keyed by the lock
//! file's path; the underlying OS-level file lock is acquired only once, on
//! the first (non-reentrant) call, and released only when the last guard for
//! that path is dropped.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::error::ErrorKind;
use crate::error::RvcError;

struct HeldLock {
    count: u32,
    file: Option<File>,
}

fn registry() -> &'static Mutex<HashMap<PathBuf, HeldLock>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, HeldLock>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A held advisory lock on a working copy. The lock is released when this
/// guard (and every other reentrant guard for the same path) is dropped.
#[must_use]
pub struct WcLock {
    path: PathBuf,
}

impl WcLock {
    /// Acquires the lock at `lock_path`, creating the lock file if needed.
    ///
    /// Returns [`ErrorKind::LockOwnerMismatch`] if another process already
    /// holds it. A second acquisition from within this process succeeds and
    /// is reentrant: the lock is only released once every such guard has
    /// been dropped.
    pub fn acquire(lock_path: impl Into<PathBuf>) -> Result<Self, RvcError> {
        let path = lock_path.into();
        let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(held) = map.get_mut(&path) {
            held.count += 1;
            return Ok(Self { path });
        }

        let file = open_and_lock(&path)?;
        map.insert(path.clone(), HeldLock { count: 1, file: Some(file) });
        Ok(Self { path })
    }
}

impl Drop for WcLock {
    fn drop(&mut self) {
        let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(held) = map.get_mut(&self.path) {
            held.count -= 1;
            if held.count == 0 {
                // Dropping `file` here releases the OS-level lock.
                map.remove(&self.path);
            }
        }
    }
}

#[cfg(unix)]
fn open_and_lock(path: &Path) -> Result<File, RvcError> {
    use rustix::fs::FlockOperation;

    let file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| RvcError::io(path.to_path_buf(), e))?;
    rustix::fs::flock(&file, FlockOperation::NonBlockingLockExclusive).map_err(|e| {
        let io_error = std::io::Error::from(e);
        if io_error.kind() == std::io::ErrorKind::WouldBlock {
            RvcError::tagged(ErrorKind::LockOwnerMismatch, format!("{}: already locked by another process", path.display()))
        } else {
            RvcError::io(path.to_path_buf(), io_error)
        }
    })?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_and_lock(path: &Path) -> Result<File, RvcError> {
    // No portable advisory file lock outside unix in this crate's dependency
    // stack; cross-process exclusion is not enforced on this platform, only
    // the in-process reentrant bookkeeping above.
    File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| RvcError::io(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_the_same_path_twice_from_one_process_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("working_copy.lock");
        let outer = WcLock::acquire(&path).unwrap();
        let inner = WcLock::acquire(&path).unwrap();
        drop(inner);
        drop(outer);
    }

    #[cfg(unix)]
    #[test]
    fn a_lock_is_released_once_every_reentrant_guard_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("working_copy.lock");
        let outer = WcLock::acquire(&path).unwrap();
        let inner = WcLock::acquire(&path).unwrap();
        drop(outer);
        // Still held by `inner`, so re-acquiring from this same process still
        // succeeds (reentrant), but the registry entry must not have been
        // dropped prematurely.
        let again = WcLock::acquire(&path).unwrap();
        drop(again);
        drop(inner);
    }
}
