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

//! `rvc status` — reports local modifications relative to each entry's
//! recorded base revision.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::rs::NodeKind;
use rvc_lib::wc::ModificationStatus;
use rvc_lib::wc::Schedule;
use rvc_lib::wc::Translator;
use rvc_lib::wc::detector;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::commands::eol_strategy;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Working copy to inspect (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: StatusArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let workspace = Workspace::open(&start)?;
    let converter = workspace.ui_converter();

    let mut out = ui.stdout_formatter();
    for (path, entry) in workspace.entries.walk_entries() {
        let code = match entry.schedule {
            Schedule::Added => 'A',
            Schedule::Deleted => 'D',
            Schedule::Replaced => 'R',
            Schedule::Normal if entry.kind == NodeKind::Directory => continue,
            Schedule::Normal => {
                let Some(base_revision) = entry.base_revision else { continue };
                let fs_path = path.to_fs_path(&workspace.root).map_err(|_| {
                    CommandError::internal(format!("{}: invalid working-copy path", path.as_internal_file_string()))
                })?;
                let base_node = workspace.store.node_at(base_revision, path)?;
                let translator = Translator::new(eol_strategy(&base_node.properties), Vec::new(), entry.kind == NodeKind::Symlink);
                let pristine = workspace.store.read_file(base_revision, path)?;
                match detector::detect(&fs_path, &entry.text_fingerprint, &pristine, &translator)? {
                    ModificationStatus::Unmodified => continue,
                    ModificationStatus::Missing => '!',
                    ModificationStatus::ModifiedCheap | ModificationStatus::ModifiedDeep => 'M',
                }
            }
        };
        writeln!(out, "{code}       {}", converter.format_file_path(path)).map_err(CommandError::from)?;
    }
    Ok(())
}
