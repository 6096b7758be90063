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

//! `rvc revert` — discards local scheduling and content changes, restoring
//! pristine text for each reverted path.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::repo_path::RepoPathBuf;
use rvc_lib::rs::NodeKind;
use rvc_lib::wc::Schedule;
use rvc_lib::wc::Translator;
use rvc_lib::wc::detector;
use rvc_lib::wc::Fingerprint;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::commands::eol_strategy;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct RevertArgs {
    /// Working copy to revert in (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Paths to revert, relative to the working copy root.
    paths: Vec<String>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: RevertArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let mut workspace = Workspace::open(&start)?;
    let converter = workspace.ui_converter();

    let targets: Vec<RepoPathBuf> = args
        .paths
        .iter()
        .map(|p| converter.parse_file_path(p).map_err(|e| CommandError::user(format!("{e}"))))
        .collect::<Result<_, _>>()?;

    let mut out = ui.stdout_formatter();
    for path in &targets {
        let Some(entry) = workspace.entries.read_entry(path).cloned() else {
            writeln!(out, "{}: not under version control", converter.format_file_path(path)).map_err(CommandError::from)?;
            continue;
        };
        let fs_path = path
            .to_fs_path(&workspace.root)
            .map_err(|_| CommandError::internal(format!("{}: invalid working-copy path", path.as_internal_file_string())))?;

        match entry.schedule {
            Schedule::Added => {
                if entry.kind != NodeKind::Directory {
                    let _ = std::fs::remove_file(&fs_path);
                }
                workspace.entries.remove_entry(path);
            }
            Schedule::Deleted | Schedule::Replaced | Schedule::Normal => {
                let Some(base_revision) = entry.base_revision else { continue };
                if entry.kind == NodeKind::Directory {
                    std::fs::create_dir_all(&fs_path)?;
                } else {
                    let base_node = workspace.store.node_at(base_revision, path)?;
                    let eol = eol_strategy(&base_node.properties);
                    let translator = Translator::new(eol, Vec::new(), entry.kind == NodeKind::Symlink);
                    let pristine = workspace.store.read_file(base_revision, path)?;
                    let working_form = translator.to_working_form(&pristine)?;
                    if let Some(parent) = fs_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&fs_path, &working_form)?;
                }
                let fingerprint = if entry.kind == NodeKind::Directory { Fingerprint::default() } else { detector::fingerprint(&fs_path)? };
                let restored = rvc_lib::wc::WcEntry {
                    kind: entry.kind,
                    schedule: Schedule::Normal,
                    base_revision: Some(base_revision),
                    text_fingerprint: fingerprint,
                    prop_fingerprint: Fingerprint::default(),
                    switched: entry.switched,
                    absent: false,
                    conflict_artifacts: Vec::new(),
                    copyfrom_path: None,
                    copyfrom_revision: None,
                };
                workspace.entries.write_entry(path.clone(), restored);
            }
        }
        writeln!(out, "Reverted {}", converter.format_file_path(path)).map_err(CommandError::from)?;
    }
    drop(out);
    workspace.entries.sync()?;
    Ok(())
}
