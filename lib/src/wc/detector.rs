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

//! The local-modification detector (C2c): cheap-then-deep comparison
//! between a working file and its recorded fingerprint.
//!
//! Checks run in increasing cost order and short-circuit on the first
//! definitive answer: existence, then size, then mtime, and only if all of
//! those agree (meaning the file *looks* unchanged despite no guarantee) is
//! the file re-read and compared byte-for-byte against the pristine copy,
//! after translating the working form back to repository-normal form.

use std::fs;
use std::path::Path;

use crate::error::RvcError;
use crate::wc::entry::Fingerprint;
use crate::wc::translator::Translator;

/// The verdict of comparing a working file against its recorded state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModificationStatus {
    /// The fingerprint alone (existence, size, or mtime) proves a change.
    ModifiedCheap,
    /// The fingerprint matched, but byte comparison found the content has
    /// actually changed (e.g. content restored to a different value with
    /// the same size and an mtime that happens to match, or the only check
    /// available was the deep one because the fingerprint was absent).
    ModifiedDeep,
    /// The file is missing on disk.
    Missing,
    Unmodified,
}

/// Computes the recorded [`Fingerprint`] of the file at `path`.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, RvcError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Fingerprint::default()),
        Err(e) => return Err(RvcError::io(path.to_path_buf(), e)),
    };
    let mtime = metadata.modified().ok();
    let (mtime_secs, mtime_nanos) = match mtime.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()) {
        Some(duration) => (Some(duration.as_secs() as i64), Some(duration.subsec_nanos())),
        None => (None, None),
    };
    Ok(Fingerprint {
        size: Some(metadata.len()),
        mtime_secs,
        mtime_nanos,
    })
}

/// Detects whether the working file at `path` has changed from its
/// `recorded` fingerprint and `pristine` (repository-normal) content.
///
/// `translator` converts pristine content to and from working form so the
/// deep comparison is apples-to-apples: the working file's bytes are
/// translated back to repository-normal form before comparing against
/// `pristine`.
pub fn detect(path: &Path, recorded: &Fingerprint, pristine: &[u8], translator: &Translator) -> Result<ModificationStatus, RvcError> {
    let current = fingerprint(path)?;
    if current.size.is_none() {
        return Ok(if recorded.size.is_none() {
            ModificationStatus::Unmodified
        } else {
            ModificationStatus::Missing
        });
    }
    if current.size != recorded.size {
        return Ok(ModificationStatus::ModifiedCheap);
    }
    if recorded.mtime_secs.is_some() && current.mtime_secs == recorded.mtime_secs && current.mtime_nanos == recorded.mtime_nanos {
        return Ok(ModificationStatus::Unmodified);
    }

    let working_bytes = fs::read(path).map_err(|e| RvcError::io(path.to_path_buf(), e))?;
    let normalized = translator.to_repository_form(&working_bytes)?;
    if normalized == pristine {
        Ok(ModificationStatus::Unmodified)
    } else {
        Ok(ModificationStatus::ModifiedDeep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wc::translator::EolStrategy;

    fn identity_translator() -> Translator {
        Translator::new(EolStrategy::None, Vec::new(), false)
    }

    #[test]
    fn a_missing_file_with_no_recorded_fingerprint_is_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let status = detect(&path, &Fingerprint::default(), b"", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::Unmodified);
    }

    #[test]
    fn a_missing_file_with_a_recorded_fingerprint_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let recorded = Fingerprint { size: Some(5), mtime_secs: Some(1), mtime_nanos: Some(0) };
        let status = detect(&path, &recorded, b"hello", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::Missing);
    }

    #[test]
    fn a_size_mismatch_is_a_cheap_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hello world").unwrap();
        let recorded = Fingerprint { size: Some(5), mtime_secs: None, mtime_nanos: None };
        let status = detect(&path, &recorded, b"hello", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::ModifiedCheap);
    }

    #[test]
    fn matching_size_and_mtime_short_circuits_to_unmodified_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hello").unwrap();
        let current = fingerprint(&path).unwrap();
        // Even if the pristine content differs, a matching cheap fingerprint
        // short-circuits the deep comparison.
        let status = detect(&path, &current, b"DIFFERENT", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::Unmodified);
    }

    #[test]
    fn same_size_different_mtime_falls_through_to_a_deep_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hello").unwrap();
        let recorded = Fingerprint { size: Some(5), mtime_secs: Some(1), mtime_nanos: Some(0) };
        let status = detect(&path, &recorded, b"hello", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::Unmodified);

        let status = detect(&path, &recorded, b"worlds", &identity_translator()).unwrap();
        assert_eq!(status, ModificationStatus::ModifiedDeep);
    }
}
