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

//! `rvc update` — brings an existing working copy up to a revision,
//! touching only what actually changed (unlike `switch`/`checkout`, which
//! re-materialize from scratch).

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Working copy to update (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Revision to update to (defaults to the repository's youngest).
    revision: Option<u64>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: UpdateArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let mut workspace = Workspace::open(&start)?;
    let revision = args.revision.unwrap_or_else(|| workspace.store.youngest());
    let from = workspace.revision;
    workspace.update(revision)?;
    writeln!(ui.stdout_formatter(), "Updated {} from revision {from} to {revision}", workspace.root.display())
        .map_err(CommandError::from)?;
    Ok(())
}
