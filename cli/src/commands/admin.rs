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

//! `rvc admin` — repository lifecycle operations that act on the store
//! itself rather than a working copy.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use clap::Subcommand;
use rvc_lib::rs::RevisionStore;

use crate::command_error::CommandError;
use crate::ui::Ui;

/// Relative to the repository root, same spot `serve` and `from_repo_config`
/// read the repo-level config layer back from.
pub const REPO_CONFIG_PATH: &str = "conf/config.toml";

const DEFAULT_REPO_CONFIG_TOML: &str = r#"anon-access = "read"
auth-access = "write"
realm = ""
default-eol = "native"
"#;

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Creates a new, empty repository.
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Where to create the repository.
    path: PathBuf,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: AdminCommand) -> Result<(), CommandError> {
    match args {
        AdminCommand::Create(args) => create(ui, cwd, args),
    }
}

fn create(ui: &mut Ui, cwd: &Path, args: CreateArgs) -> Result<(), CommandError> {
    let root = cwd.join(&args.path);
    let store = RevisionStore::create(&root)?;
    let conf_dir = root.join("conf");
    std::fs::create_dir_all(&conf_dir)?;
    std::fs::write(conf_dir.join("config.toml"), DEFAULT_REPO_CONFIG_TOML)?;
    writeln!(ui.stdout_formatter(), "Created repository {} (uuid {})", root.display(), store.uuid())
        .map_err(CommandError::from)?;
    Ok(())
}
