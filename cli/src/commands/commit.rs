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

//! `rvc commit` — harvests local modifications from the working copy and
//! drives them into a new revision (§3, §4.10).
//!
//! Harvesting reads pristine content live from the repository
//! (`RevisionStore::read_file`/`node_at`) rather than through a separate
//! local pristine-copy cache: this is a centralized VCS with an
//! always-reachable store, so there's nothing a cache would save beyond
//! what the store itself already does.
//!
//! Property edits have no CLI surface of their own (no `propset`
//! equivalent is in scope), so harvested candidates only ever carry
//! `text_mod`/`add`/`delete` — `prop_changes` stays empty for every
//! candidate this harvester builds.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::dp::CommitCandidate;
use rvc_lib::dp::StateFlags;
use rvc_lib::dp::drive_commit;
use rvc_lib::repo_path::RepoPath;
use rvc_lib::repo_path::RepoPathBuf;
use rvc_lib::rs::NodeKind;
use rvc_lib::rs::PropTable;
use rvc_lib::rs::TransactionTreeEditor;
use rvc_lib::wc::EolStrategy;
use rvc_lib::wc::ModificationStatus;
use rvc_lib::wc::Schedule;
use rvc_lib::wc::Translator;
use rvc_lib::wc::detector;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::commands::eol_strategy;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Working copy to commit from (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// The log message, recorded as the `rvc:log` revision property.
    #[arg(short = 'm', long)]
    message: String,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: CommitArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let mut workspace = Workspace::open(&start)?;

    let candidates = harvest(&workspace)?;
    if candidates.is_empty() {
        writeln!(ui.stdout_formatter(), "Nothing to commit.").map_err(CommandError::from)?;
        return Ok(());
    }

    let new_revision = workspace.store.youngest() + 1;
    let mut txn = workspace.store.begin_txn();
    let postcommit = {
        let mut editor = TransactionTreeEditor::new(&mut txn);
        drive_commit(&candidates, new_revision, &mut editor)?
    };

    let mut revprops = PropTable::new();
    revprops.insert("rvc:log".to_string(), args.message.into_bytes());
    let committed = txn.commit(revprops)?;
    debug_assert_eq!(committed, new_revision);

    for item in &postcommit {
        if let Some(mut entry) = workspace.entries.read_entry(&item.path).cloned() {
            entry.schedule = Schedule::Normal;
            entry.base_revision = Some(item.new_revision);
            entry.copyfrom_path = None;
            entry.copyfrom_revision = None;
            if item.install_pristine {
                let fs_path = item.path.to_fs_path(&workspace.root).map_err(|_| {
                    CommandError::internal(format!("{}: invalid working-copy path", item.path.as_internal_file_string()))
                })?;
                entry.text_fingerprint = detector::fingerprint(&fs_path)?;
            }
            workspace.entries.write_entry(item.path.clone(), entry);
        } else {
            workspace.entries.remove_entry(&item.path);
        }
    }
    workspace.entries.sync()?;
    workspace.revision = committed;
    workspace.persist_format()?;

    writeln!(ui.stdout_formatter(), "Committed revision {committed}").map_err(CommandError::from)?;
    Ok(())
}

fn harvest(workspace: &Workspace) -> Result<Vec<CommitCandidate>, CommandError> {
    let mut candidates = Vec::new();
    for (path, entry) in workspace.entries.walk_entries() {
        match entry.schedule {
            Schedule::Added => {
                candidates.push(harvest_added(workspace, path, entry)?);
            }
            Schedule::Deleted => {
                candidates.push(CommitCandidate {
                    path: path.clone(),
                    base_revision: entry.base_revision,
                    copyfrom: None,
                    flags: StateFlags { delete: true, ..Default::default() },
                    prop_changes: Vec::new(),
                    is_directory: entry.kind == NodeKind::Directory,
                    pristine_contents: Vec::new(),
                    new_contents: Vec::new(),
                    tree_conflict: entry.has_conflict(),
                });
            }
            Schedule::Replaced => {
                let mut candidate = harvest_added(workspace, path, entry)?;
                candidate.flags.delete = true;
                candidates.push(candidate);
            }
            Schedule::Normal => {
                if entry.kind == NodeKind::Directory || entry.absent {
                    continue;
                }
                if let Some(candidate) = harvest_modified(workspace, path, entry)? {
                    candidates.push(candidate);
                }
            }
        }
    }
    Ok(candidates)
}

fn harvest_added(workspace: &Workspace, path: &RepoPath, entry: &rvc_lib::wc::WcEntry) -> Result<CommitCandidate, CommandError> {
    let is_directory = entry.kind == NodeKind::Directory;
    let new_contents = if is_directory {
        Vec::new()
    } else {
        let fs_path = path
            .to_fs_path(&workspace.root)
            .map_err(|_| CommandError::internal(format!("{}: invalid working-copy path", path.as_internal_file_string())))?;
        let raw = std::fs::read(&fs_path)?;
        let translator = Translator::new(EolStrategy::None, Vec::new(), entry.kind == NodeKind::Symlink);
        translator.to_repository_form(&raw)?
    };
    let copyfrom = match (&entry.copyfrom_path, entry.copyfrom_revision) {
        (Some(copy_path), Some(revision)) => Some(rvc_lib::dp::CopyFrom {
            path: RepoPathBuf::from_internal_string(copy_path.clone())
                .map_err(|e| CommandError::internal(format!("corrupt copy-from path in entry database: {e}")))?,
            revision,
        }),
        _ => None,
    };
    Ok(CommitCandidate {
        path: path.to_owned(),
        base_revision: None,
        copyfrom,
        flags: StateFlags { add: true, text_mod: !is_directory, is_copy: copyfrom_exists(entry), ..Default::default() },
        prop_changes: Vec::new(),
        is_directory,
        pristine_contents: Vec::new(),
        new_contents,
        tree_conflict: entry.has_conflict(),
    })
}

fn copyfrom_exists(entry: &rvc_lib::wc::WcEntry) -> bool {
    entry.copyfrom_path.is_some()
}

fn harvest_modified(workspace: &Workspace, path: &RepoPath, entry: &rvc_lib::wc::WcEntry) -> Result<Option<CommitCandidate>, CommandError> {
    let Some(base_revision) = entry.base_revision else {
        return Ok(None);
    };
    let fs_path = path
        .to_fs_path(&workspace.root)
        .map_err(|_| CommandError::internal(format!("{}: invalid working-copy path", path.as_internal_file_string())))?;
    let base_node = workspace.store.node_at(base_revision, path)?;
    let eol = eol_strategy(&base_node.properties);
    let translator = Translator::new(eol, Vec::new(), entry.kind == NodeKind::Symlink);
    let pristine_contents = workspace.store.read_file(base_revision, path)?;

    let status = detector::detect(&fs_path, &entry.text_fingerprint, &pristine_contents, &translator)?;
    if status == ModificationStatus::Unmodified {
        return Ok(None);
    }

    let raw = std::fs::read(&fs_path)?;
    let new_contents = translator.to_repository_form(&raw)?;
    if new_contents == pristine_contents {
        return Ok(None);
    }

    Ok(Some(CommitCandidate {
        path: path.to_owned(),
        base_revision: Some(base_revision),
        copyfrom: None,
        flags: StateFlags { text_mod: true, ..Default::default() },
        prop_changes: Vec::new(),
        is_directory: false,
        pristine_contents,
        new_contents,
        tree_conflict: entry.has_conflict(),
    }))
}
