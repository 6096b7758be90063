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

//! The commit driver (C3d): walks harvested commit candidates and drives a
//! tree editor against a server transaction.

use std::collections::BTreeSet;

use crate::dp::editor::CopyFrom;
use crate::dp::editor::TreeEditor;
use crate::dp::editor::diff_to_windows;
use crate::error::ErrorKind;
use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::repo_path::RepoPathBuf;
use crate::rs::Revision;

/// The subset of state flags that apply to a single commit candidate (§3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateFlags {
    pub add: bool,
    pub delete: bool,
    pub text_mod: bool,
    pub prop_mod: bool,
    pub is_copy: bool,
}

/// A change to a single property, as harvested from the working copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropChange {
    pub name: String,
    pub value: Option<Vec<u8>>,
}

/// A derived, in-memory record produced by harvesting (§3).
#[derive(Clone, Debug)]
pub struct CommitCandidate {
    pub path: RepoPathBuf,
    pub base_revision: Option<Revision>,
    pub copyfrom: Option<CopyFrom>,
    pub flags: StateFlags,
    pub prop_changes: Vec<PropChange>,
    pub is_directory: bool,
    pub pristine_contents: Vec<u8>,
    pub new_contents: Vec<u8>,
    pub tree_conflict: bool,
}

/// Queues a postcommit work item: the new revision to record, and (for files
/// with a text modification) the path whose pristine text must be
/// installed from the staged temp file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostcommitItem {
    pub path: RepoPathBuf,
    pub new_revision: Revision,
    pub install_pristine: bool,
}

/// Drives `editor` with the edit stream for `candidates`, returning the
/// postcommit work items to enqueue. Performs the pre-commit local checks
/// (§4.10) before issuing any editor call; on failure, `editor` is not
/// touched at all.
pub fn drive_commit(
    candidates: &[CommitCandidate],
    new_revision: Revision,
    editor: &mut dyn TreeEditor,
) -> Result<Vec<PostcommitItem>, RvcError> {
    check_preconditions(candidates)?;

    let mut sorted: Vec<&CommitCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let base_revision = sorted.iter().filter_map(|c| c.base_revision).min().unwrap_or(0);
    let root_handle = editor.open_root(base_revision)?;
    let mut open_dirs = vec![(RepoPathBuf::root(), root_handle)];
    let mut postcommit = Vec::new();

    for candidate in &sorted {
        let parent_path = candidate.path.parent().map(|p| p.to_owned()).unwrap_or_else(RepoPathBuf::root);
        let parent_handle = ensure_open(&parent_path, base_revision, &mut open_dirs, editor)?;

        if candidate.flags.delete {
            editor.delete_entry(&candidate.path, candidate.base_revision, parent_handle)?;
        }

        if candidate.flags.add {
            drive_add(candidate, parent_handle, editor)?;
        } else if !candidate.flags.delete {
            drive_modify(candidate, candidate.base_revision.unwrap_or(base_revision), parent_handle, editor)?;
        }

        if candidate.flags.add || candidate.flags.text_mod || candidate.flags.prop_mod || candidate.flags.delete {
            postcommit.push(PostcommitItem {
                path: candidate.path.clone(),
                new_revision,
                install_pristine: candidate.flags.text_mod && !candidate.is_directory,
            });
        }
    }

    for (_, handle) in open_dirs.into_iter().rev() {
        editor.close_directory(handle)?;
    }
    editor.close_edit()?;
    Ok(postcommit)
}

fn ensure_open(
    path: &RepoPath,
    base_revision: Revision,
    open_dirs: &mut Vec<(RepoPathBuf, crate::dp::editor::DirHandle)>,
    editor: &mut dyn TreeEditor,
) -> Result<crate::dp::editor::DirHandle, RvcError> {
    if let Some((_, handle)) = open_dirs.iter().find(|(p, _)| p.as_ref() == path) {
        return Ok(*handle);
    }
    let parent_path = path.parent().map(|p| p.to_owned()).unwrap_or_else(RepoPathBuf::root);
    let parent_handle = if parent_path.as_ref() == path {
        open_dirs[0].1
    } else {
        ensure_open(&parent_path, base_revision, open_dirs, editor)?
    };
    let handle = editor.open_directory(path, parent_handle, base_revision)?;
    open_dirs.push((path.to_owned(), handle));
    Ok(handle)
}

fn drive_add(
    candidate: &CommitCandidate,
    parent: crate::dp::editor::DirHandle,
    editor: &mut dyn TreeEditor,
) -> Result<(), RvcError> {
    if candidate.is_directory {
        let handle = editor.add_directory(&candidate.path, parent, candidate.copyfrom.clone())?;
        for change in &candidate.prop_changes {
            editor.change_dir_prop(handle, &change.name, change.value.clone())?;
        }
        editor.close_directory(handle)
    } else {
        let handle = editor.add_file(&candidate.path, parent, candidate.copyfrom.clone())?;
        if candidate.flags.text_mod || candidate.copyfrom.is_none() {
            let windows = diff_to_windows(b"", &candidate.new_contents);
            editor.apply_textdelta(handle, None, &windows)?;
        }
        for change in &candidate.prop_changes {
            editor.change_file_prop(handle, &change.name, change.value.clone())?;
        }
        editor.close_file(handle, None)
    }
}

fn drive_modify(
    candidate: &CommitCandidate,
    base_revision: Revision,
    parent: crate::dp::editor::DirHandle,
    editor: &mut dyn TreeEditor,
) -> Result<(), RvcError> {
    if !candidate.flags.text_mod && !candidate.flags.prop_mod {
        return Ok(());
    }
    if candidate.is_directory {
        let handle = editor.open_directory(&candidate.path, parent, base_revision)?;
        for change in &candidate.prop_changes {
            editor.change_dir_prop(handle, &change.name, change.value.clone())?;
        }
        editor.close_directory(handle)
    } else {
        let handle = editor.open_file(&candidate.path, parent, base_revision)?;
        if candidate.flags.text_mod {
            let windows = diff_to_windows(&candidate.pristine_contents, &candidate.new_contents);
            editor.apply_textdelta(handle, None, &windows)?;
        }
        for change in &candidate.prop_changes {
            editor.change_file_prop(handle, &change.name, change.value.clone())?;
        }
        editor.close_file(handle, None)
    }
}

/// The pre-commit local checks that must fail without ever opening a
/// transaction (§4.10).
fn check_preconditions(candidates: &[CommitCandidate]) -> Result<(), RvcError> {
    let mut seen_urls = BTreeSet::new();
    for candidate in candidates {
        if !seen_urls.insert(candidate.path.clone()) {
            return Err(RvcError::DuplicateCommitUrl {
                url: candidate.path.as_internal_file_string().to_string(),
            });
        }
        if candidate.tree_conflict {
            return Err(RvcError::tagged(
                ErrorKind::TreeConflict,
                format!("{}: commit candidate is in conflict", candidate.path.as_internal_file_string()),
            ));
        }
    }

    let paths: BTreeSet<&RepoPathBuf> = candidates.iter().map(|c| &c.path).collect();
    for candidate in candidates {
        if candidate.flags.add
            && let Some(parent) = candidate.path.parent()
            && candidate.base_revision.is_none()
            && !paths.contains(&parent.to_owned())
            && !parent.is_root()
        {
            return Err(RvcError::tagged(
                ErrorKind::IllegalTarget,
                format!("{}: parent is not versioned and not part of this commit", candidate.path.as_internal_file_string()),
            ));
        }
        if candidate.flags.delete {
            for other in candidates {
                if other.flags.delete && other.path != candidate.path && candidate.path.starts_with(&other.path) {
                    return Err(RvcError::tagged(
                        ErrorKind::IllegalTarget,
                        format!(
                            "{}: already deleted as part of deleting {}",
                            candidate.path.as_internal_file_string(),
                            other.path.as_internal_file_string()
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Computes the common base URL (here: repository path) of a candidate set:
/// the longest common path prefix, shortened to its parent when the prefix
/// itself is a candidate that carries more than a pure property change
/// (§4.10 step 2).
pub fn common_base_path(candidates: &[CommitCandidate]) -> RepoPathBuf {
    let Some(first) = candidates.first() else {
        return RepoPathBuf::root();
    };
    let mut prefix: &RepoPath = &first.path;
    for candidate in &candidates[1..] {
        prefix = prefix.split_common_prefix(&candidate.path).0;
    }
    if let Some(candidate) = candidates.iter().find(|c| c.path.as_ref() == prefix)
        && (candidate.flags.add || candidate.flags.delete || candidate.flags.text_mod)
    {
        return prefix.parent().unwrap_or(RepoPath::root()).to_owned();
    }
    prefix.to_owned()
}
