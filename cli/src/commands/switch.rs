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

//! `rvc switch` — re-points an existing working copy at a different
//! repo-relative subtree (and, optionally, revision), re-using its entry
//! database rather than starting a fresh checkout.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::repo_path::RepoPathBuf;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// Working copy to switch (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// New repo-relative subtree to check out.
    prefix: String,
    /// Revision to switch to (defaults to the repository's youngest).
    #[arg(long)]
    revision: Option<u64>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: SwitchArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let mut workspace = Workspace::open(&start)?;
    let revision = args.revision.unwrap_or_else(|| workspace.store.youngest());
    let prefix = RepoPathBuf::from_internal_string(args.prefix)
        .map_err(|e| CommandError::user(format!("invalid prefix: {e}")))?;
    workspace.materialize(&prefix, revision)?;
    writeln!(
        ui.stdout_formatter(),
        "Switched {} to {}@{revision}",
        workspace.root.display(),
        prefix.as_internal_file_string()
    )
    .map_err(CommandError::from)?;
    Ok(())
}
