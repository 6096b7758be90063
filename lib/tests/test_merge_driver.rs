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

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use rvc_lib::RvcError;
use rvc_lib::dp::DirEntryMergeResult;
use rvc_lib::dp::FileMergeResult;
use rvc_lib::dp::PropMergeResult;
use rvc_lib::dp::TextMergeOracle;
use rvc_lib::dp::TextMergeOutcome;
use rvc_lib::dp::merge_dir_entry;
use rvc_lib::dp::merge_file;
use rvc_lib::dp::merge_prop;

struct LineOracle;
impl TextMergeOracle for LineOracle {
    fn merge_text(&self, base: &[u8], mine: &[u8], theirs: &[u8]) -> Result<TextMergeOutcome, RvcError> {
        if base == mine {
            Ok(TextMergeOutcome::Clean(theirs.to_vec()))
        } else if base == theirs {
            Ok(TextMergeOutcome::Clean(mine.to_vec()))
        } else {
            let mut markers = b"<<<<<<<\n".to_vec();
            markers.extend_from_slice(mine);
            markers.extend_from_slice(b"=======\n");
            markers.extend_from_slice(theirs);
            markers.extend_from_slice(b">>>>>>>\n");
            Ok(TextMergeOutcome::Conflict(markers))
        }
    }
}

#[test]
fn overlapping_edits_conflict_and_carry_named_artifacts() {
    let props = BTreeMap::new();
    let result = merge_file(&LineOracle, Some(b"base\n"), b"mine\n", true, &props, b"theirs\n", &props, 3, 4).unwrap();
    match result {
        FileMergeResult::Conflicted { working, artifacts } => {
            assert!(working.starts_with(b"<<<<<<<"));
            assert_eq!(artifacts.left_suffix, ".merge-left.r3");
            assert_eq!(artifacts.right_suffix, ".merge-right.r4");
            assert_eq!(artifacts.right_contents, b"theirs\n");
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn non_overlapping_edits_merge_cleanly() {
    let props = BTreeMap::new();
    let result = merge_file(&LineOracle, Some(b"base\n"), b"mine\n", true, &props, b"base\n", &props, 3, 4).unwrap();
    assert_eq!(result, FileMergeResult::Merged(b"mine\n".to_vec()));
}

#[test]
fn a_mime_type_property_marks_content_as_binary_even_when_it_looks_like_text() {
    let mut props = BTreeMap::new();
    props.insert("rvc:mime-type".to_string(), b"application/octet-stream".to_vec());
    let empty_props = BTreeMap::new();
    let result = merge_file(&LineOracle, Some(b"base"), b"mine", true, &props, b"theirs", &empty_props, 1, 2).unwrap();
    assert_matches!(result, FileMergeResult::Conflicted { .. });
}

#[test]
fn a_property_changed_only_on_one_side_merges_cleanly() {
    let result = merge_prop(Some(b"old"), Some(b"old"), Some(b"new"));
    assert_eq!(result, PropMergeResult::Clean(Some(b"new".to_vec())));
}

#[test]
fn a_property_changed_identically_on_both_sides_is_already_merged() {
    let result = merge_prop(Some(b"old"), Some(b"new"), Some(b"new"));
    assert_eq!(result, PropMergeResult::AlreadyMerged);
}

#[test]
fn a_property_changed_differently_on_both_sides_conflicts() {
    let result = merge_prop(Some(b"old"), Some(b"mine"), Some(b"theirs"));
    assert_eq!(
        result,
        PropMergeResult::Conflict { mine: Some(b"mine".to_vec()), theirs: Some(b"theirs".to_vec()) }
    );
}

#[test]
fn an_incoming_add_colliding_with_an_unversioned_file_is_obstructed() {
    let result = merge_dir_entry(true, true, false);
    assert_eq!(result, DirEntryMergeResult::Obstructed);
}

#[test]
fn an_incoming_add_of_an_already_versioned_entry_applies() {
    let result = merge_dir_entry(true, true, true);
    assert_eq!(result, DirEntryMergeResult::Applied);
}
