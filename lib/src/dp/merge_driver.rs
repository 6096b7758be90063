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

//! The merge driver (C3c): applies an incoming edit against a possibly
//! locally-modified working file or property set, producing a merged
//! result or a conflict.
//!
//! The actual three-way text merge is an external oracle (diff3-class
//! algorithms are out of scope here) injected via [`TextMergeOracle`]; this
//! module owns only the classification (clean / merged / conflict /
//! obstructed / silent-no-op) and the conflict-artifact naming convention.

use std::collections::BTreeMap;

use crate::error::RvcError;
use crate::rs::Revision;

/// A reserved property name (§3) carrying the file's MIME type, when set.
pub const MIME_TYPE_PROPERTY: &str = "rvc:mime-type";

/// An external three-way text merge. Implementations range from a
/// line-oriented diff3 to a user-configured external tool; this crate picks
/// none of them, it only defines the seam.
pub trait TextMergeOracle {
    /// Attempts a three-way merge of `mine` against `base`/`theirs`. Returns
    /// `Ok(MergeOutcome::Clean(bytes))` on an unambiguous result, or
    /// `Ok(MergeOutcome::Conflict(bytes))` with markers embedded at the
    /// conflicting hunks.
    fn merge_text(&self, base: &[u8], mine: &[u8], theirs: &[u8]) -> Result<TextMergeOutcome, RvcError>;
}

/// The result of invoking a [`TextMergeOracle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextMergeOutcome {
    Clean(Vec<u8>),
    Conflict(Vec<u8>),
}

/// The classification of a single-file merge (§4.9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileMergeResult {
    /// `mine` already equals the merged result; nothing to write.
    Unchanged,
    /// The incoming side was applied cleanly with no local edits in the way.
    Changed(Vec<u8>),
    /// A clean three-way merge combined local and incoming edits.
    Merged(Vec<u8>),
    /// The oracle found overlapping edits; markers are embedded in
    /// `working`, and the three inputs are preserved as named artifacts.
    Conflicted {
        working: Vec<u8>,
        artifacts: ConflictArtifacts,
    },
    /// The incoming add exactly matches a file the user already created
    /// locally with the same content; applying it would be a no-op.
    SilentNoOp,
    /// The path is locally occupied by something the incoming edit did not
    /// expect (e.g. an unversioned directory where a file is being added),
    /// and the merge cannot proceed without user intervention.
    Obstructed,
}

/// Names and contents of the three conflict-artifact siblings written
/// alongside a conflicted working file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictArtifacts {
    pub working_suffix: String,
    pub left_suffix: String,
    pub right_suffix: String,
    pub left_contents: Vec<u8>,
    pub right_contents: Vec<u8>,
}

impl ConflictArtifacts {
    fn named(mine: Vec<u8>, left_revision: Revision, left: Vec<u8>, right_revision: Revision, right: Vec<u8>) -> Self {
        let _ = mine;
        Self {
            working_suffix: ".working".to_string(),
            left_suffix: format!(".merge-left.r{left_revision}"),
            right_suffix: format!(".merge-right.r{right_revision}"),
            left_contents: left,
            right_contents: right,
        }
    }
}

/// Whether a file's content is binary, per the `rvc:mime-type` property on
/// either side of the merge (a MIME type not starting with `text/` is
/// treated as binary; absence of the property defers to content sniffing).
fn is_binary(props: &BTreeMap<String, Vec<u8>>, contents: &[u8]) -> bool {
    if let Some(mime) = props.get(MIME_TYPE_PROPERTY)
        && let Ok(mime) = std::str::from_utf8(mime)
    {
        return !mime.starts_with("text/");
    }
    crate::wc::translator::is_binary(contents)
}

/// Merges a single file's content. `base` is the common ancestor text,
/// `mine` the current working content, `theirs` the incoming content.
/// `mine_modified` records whether the working copy has diverged from
/// `base` independent of byte equality (e.g. property-only local changes
/// still count as "locally touched" for the silent-no-op rule).
#[allow(clippy::too_many_arguments)]
pub fn merge_file(
    oracle: &dyn TextMergeOracle,
    base: Option<&[u8]>,
    mine: &[u8],
    mine_modified: bool,
    mine_props: &BTreeMap<String, Vec<u8>>,
    theirs: &[u8],
    theirs_props: &BTreeMap<String, Vec<u8>>,
    left_revision: Revision,
    right_revision: Revision,
) -> Result<FileMergeResult, RvcError> {
    // Silent no-op: this is a fresh add on both sides, client already has
    // byte-identical content, and never touched it itself.
    if base.is_none() && !mine_modified && mine == theirs {
        return Ok(FileMergeResult::SilentNoOp);
    }

    let base = base.unwrap_or(&[]);

    if !mine_modified {
        if mine == theirs {
            return Ok(FileMergeResult::Unchanged);
        }
        return Ok(FileMergeResult::Changed(theirs.to_vec()));
    }

    if mine == theirs {
        return Ok(FileMergeResult::Unchanged);
    }

    if is_binary(mine_props, mine) || is_binary(theirs_props, theirs) {
        // Binary special case: only a byte-for-byte match against one side
        // with no local modification qualifies for silent overwrite, which
        // is already handled above; any divergence here is unresolvable
        // without an oracle that understands the format, so it conflicts.
        let artifacts = ConflictArtifacts::named(mine.to_vec(), left_revision, base.to_vec(), right_revision, theirs.to_vec());
        return Ok(FileMergeResult::Conflicted { working: mine.to_vec(), artifacts });
    }

    match oracle.merge_text(base, mine, theirs)? {
        TextMergeOutcome::Clean(merged) => Ok(FileMergeResult::Merged(merged)),
        TextMergeOutcome::Conflict(markers) => {
            let artifacts = ConflictArtifacts::named(mine.to_vec(), left_revision, base.to_vec(), right_revision, theirs.to_vec());
            Ok(FileMergeResult::Conflicted { working: markers, artifacts })
        }
    }
}

/// The classification of a single property merge (§4.9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropMergeResult {
    /// Local has no conflicting change; the incoming value applies.
    Clean(Option<Vec<u8>>),
    /// Local and incoming changed the property in non-overlapping ways (the
    /// property didn't exist, or both sides agree).
    AlreadyMerged,
    /// Both sides changed the same property to different values.
    Conflict {
        mine: Option<Vec<u8>>,
        theirs: Option<Vec<u8>>,
    },
}

/// Merges a single property change. `old` is the value at the merge's base
/// revision (`None` if the property didn't exist there), `mine` is the
/// working value, `incoming` is the value the edit stream is setting
/// (`None` if it's being deleted).
pub fn merge_prop(old: Option<&[u8]>, mine: Option<&[u8]>, incoming: Option<&[u8]>) -> PropMergeResult {
    if mine == old {
        return PropMergeResult::Clean(incoming.map(|v| v.to_vec()));
    }
    if mine == incoming {
        return PropMergeResult::AlreadyMerged;
    }
    PropMergeResult::Conflict {
        mine: mine.map(|v| v.to_vec()),
        theirs: incoming.map(|v| v.to_vec()),
    }
}

/// The classification of a directory-entry merge: an add or delete of a
/// child arriving from the incoming edit stream, reconciled against what
/// the working copy already has at that name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirEntryMergeResult {
    Applied,
    /// An incoming add collided with an unversioned entry already on disk;
    /// not a conflict, but not applied either.
    Obstructed,
}

/// Reconciles an incoming child add/delete against the working copy's
/// knowledge of that name. `locally_present` is whether something
/// (versioned or not) already occupies the name on disk; `locally_versioned`
/// narrows that to "and it's a working-copy entry we control".
pub fn merge_dir_entry(incoming_is_add: bool, locally_present: bool, locally_versioned: bool) -> DirEntryMergeResult {
    if incoming_is_add && locally_present && !locally_versioned {
        return DirEntryMergeResult::Obstructed;
    }
    DirEntryMergeResult::Applied
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysClean;
    impl TextMergeOracle for AlwaysClean {
        fn merge_text(&self, _base: &[u8], _mine: &[u8], theirs: &[u8]) -> Result<TextMergeOutcome, RvcError> {
            Ok(TextMergeOutcome::Clean(theirs.to_vec()))
        }
    }

    struct AlwaysConflict;
    impl TextMergeOracle for AlwaysConflict {
        fn merge_text(&self, _base: &[u8], mine: &[u8], _theirs: &[u8]) -> Result<TextMergeOutcome, RvcError> {
            let mut markers = b"<<<<<<< .working\n".to_vec();
            markers.extend_from_slice(mine);
            markers.extend_from_slice(b"\n=======\n>>>>>>> incoming\n");
            Ok(TextMergeOutcome::Conflict(markers))
        }
    }

    #[test]
    fn unmodified_local_file_takes_the_incoming_change() {
        let props = BTreeMap::new();
        let result = merge_file(&AlwaysClean, Some(b"base"), b"base", false, &props, b"theirs", &props, 1, 2).unwrap();
        assert_eq!(result, FileMergeResult::Changed(b"theirs".to_vec()));
    }

    #[test]
    fn identical_content_is_unchanged_even_if_flagged_modified() {
        let props = BTreeMap::new();
        let result = merge_file(&AlwaysClean, Some(b"base"), b"same", true, &props, b"same", &props, 1, 2).unwrap();
        assert_eq!(result, FileMergeResult::Unchanged);
    }

    #[test]
    fn a_fresh_add_matching_byte_for_byte_is_a_silent_no_op() {
        let props = BTreeMap::new();
        let result = merge_file(&AlwaysClean, None, b"hello", false, &props, b"hello", &props, 0, 1).unwrap();
        assert_eq!(result, FileMergeResult::SilentNoOp);
    }

    #[test]
    fn divergent_local_edits_invoke_the_oracle_and_merge_cleanly() {
        let props = BTreeMap::new();
        let result = merge_file(&AlwaysClean, Some(b"base"), b"mine", true, &props, b"theirs", &props, 1, 2).unwrap();
        assert_eq!(result, FileMergeResult::Merged(b"theirs".to_vec()));
    }

    #[test]
    fn an_oracle_conflict_produces_conflict_artifacts_with_the_expected_suffixes() {
        let props = BTreeMap::new();
        let result = merge_file(&AlwaysConflict, Some(b"base"), b"mine", true, &props, b"theirs", &props, 3, 7).unwrap();
        match result {
            FileMergeResult::Conflicted { artifacts, .. } => {
                assert_eq!(artifacts.working_suffix, ".working");
                assert_eq!(artifacts.left_suffix, ".merge-left.r3");
                assert_eq!(artifacts.right_suffix, ".merge-right.r7");
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn binary_divergence_conflicts_without_invoking_the_oracle() {
        let mut props = BTreeMap::new();
        props.insert(MIME_TYPE_PROPERTY.to_string(), b"image/png".to_vec());
        let result = merge_file(&AlwaysConflict, Some(b"\0old"), b"\0mine", true, &props, b"\0theirs", &props, 1, 2).unwrap();
        assert!(matches!(result, FileMergeResult::Conflicted { .. }));
    }

    #[test]
    fn property_merge_classifies_clean_merged_and_conflict() {
        assert_eq!(merge_prop(Some(b"a"), Some(b"a"), Some(b"b")), PropMergeResult::Clean(Some(b"b".to_vec())));
        assert_eq!(merge_prop(Some(b"a"), Some(b"b"), Some(b"b")), PropMergeResult::AlreadyMerged);
        assert_eq!(
            merge_prop(Some(b"a"), Some(b"b"), Some(b"c")),
            PropMergeResult::Conflict { mine: Some(b"b".to_vec()), theirs: Some(b"c".to_vec()) }
        );
    }

    #[test]
    fn an_add_colliding_with_an_unversioned_entry_is_obstructed_not_conflicted() {
        assert_eq!(merge_dir_entry(true, true, false), DirEntryMergeResult::Obstructed);
        assert_eq!(merge_dir_entry(true, true, true), DirEntryMergeResult::Applied);
        assert_eq!(merge_dir_entry(true, false, false), DirEntryMergeResult::Applied);
    }
}
