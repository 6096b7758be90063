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

//! `rvc log` — replays revision properties for a revision range, newest
//! first, the same direction `handle_log`'s reversed-range case uses for a
//! descending request.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::rs::RevisionStore;

use crate::command_error::CommandError;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Path to the repository.
    repo: PathBuf,
    /// Oldest revision to show (defaults to revision 1, skipping the
    /// always-empty revision 0).
    #[arg(long)]
    from: Option<u64>,
    /// Newest revision to show (defaults to the youngest revision).
    #[arg(long)]
    to: Option<u64>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: LogArgs) -> Result<(), CommandError> {
    let store = RevisionStore::open(cwd.join(&args.repo))?;
    let youngest = store.youngest();
    let to = args.to.unwrap_or(youngest);
    let from = args.from.unwrap_or(1.min(to));

    let mut out = ui.stdout_formatter();
    for revision in (from..=to).rev() {
        let revprops = store.revprops(revision)?;
        let log_message = revprops
            .get("rvc:log")
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        writeln!(out, "------------------------------------------------------------------------")
            .map_err(CommandError::from)?;
        writeln!(out, "r{revision}").map_err(CommandError::from)?;
        writeln!(out).map_err(CommandError::from)?;
        writeln!(out, "{log_message}").map_err(CommandError::from)?;
    }
    Ok(())
}
