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

//! `rvc checkout` — materializes a subtree of a repository as a brand-new
//! working copy.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::repo_path::RepoPathBuf;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Path to the repository to check out from.
    repo: PathBuf,
    /// Where to create the working copy.
    destination: PathBuf,
    /// Repo-relative subtree to check out (defaults to the whole tree).
    #[arg(long)]
    prefix: Option<String>,
    /// Revision to check out (defaults to the youngest).
    #[arg(long)]
    revision: Option<u64>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: CheckoutArgs) -> Result<(), CommandError> {
    let repo_root = cwd.join(&args.repo);
    let destination = cwd.join(&args.destination);
    let mut workspace = Workspace::create(&destination, repo_root)?;
    let revision = args.revision.unwrap_or_else(|| workspace.store.youngest());
    let prefix = match args.prefix {
        Some(p) => RepoPathBuf::from_internal_string(p)
            .map_err(|e| CommandError::user(format!("invalid --prefix: {e}")))?,
        None => RepoPathBuf::root(),
    };
    workspace.materialize(&prefix, revision)?;
    writeln!(
        ui.stdout_formatter(),
        "Checked out revision {revision} into {}",
        workspace.root.display()
    )
    .map_err(CommandError::from)?;
    Ok(())
}
