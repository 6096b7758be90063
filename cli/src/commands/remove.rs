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

//! `rvc remove` — schedules versioned paths for deletion at the next
//! commit, removing their on-disk working copy in the same move.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::repo_path::RepoPathBuf;
use rvc_lib::rs::NodeKind;
use rvc_lib::wc::Schedule;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Working copy to remove from (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Paths to schedule for deletion, relative to the working copy root.
    #[arg(required = true)]
    paths: Vec<String>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: RemoveArgs) -> Result<(), CommandError> {
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
        let Some(mut entry) = workspace.entries.read_entry(path).cloned() else {
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
            Schedule::Normal | Schedule::Replaced => {
                if entry.kind == NodeKind::Directory {
                    let _ = std::fs::remove_dir(&fs_path);
                } else {
                    let _ = std::fs::remove_file(&fs_path);
                }
                entry.schedule = Schedule::Deleted;
                workspace.entries.write_entry(path.clone(), entry);
            }
            Schedule::Deleted => {}
        }
        writeln!(out, "D         {}", converter.format_file_path(path)).map_err(CommandError::from)?;
    }
    drop(out);
    workspace.entries.sync()?;
    Ok(())
}
