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

//! `rvc serve` — runs the repository server (C5) over the wire protocol
//! (C6) for one repository.

use std::io::Write as _;
use std::net::TcpListener;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use rvc_lib::config::ConfigLayerSource;
use rvc_lib::config::StackedConfig;
use rvc_lib::dp::ConcurrencyModel;
use rvc_lib::dp::RepoCommandHandler;
use rvc_lib::dp::serve;
use rvc_lib::rs::RevisionStore;

use crate::command_error::CommandError;
use crate::commands::admin::REPO_CONFIG_PATH;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the repository to serve.
    repo: PathBuf,
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3690")]
    listen: String,
    /// Number of worker threads; 0 serves one connection at a time.
    #[arg(long, default_value_t = 8)]
    threads: usize,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: ServeArgs) -> Result<(), CommandError> {
    let repo_root = cwd.join(&args.repo);
    let store = RevisionStore::open(&repo_root)?;

    let mut config = StackedConfig::with_defaults();
    config.load_layer_file(ConfigLayerSource::Repo, &repo_root.join(REPO_CONFIG_PATH))?;
    let config = config.resolve()?;

    let handler: Arc<RepoCommandHandler> = Arc::new(RepoCommandHandler::new(store, config));
    let listener = TcpListener::bind(&args.listen)?;
    let local_addr = listener.local_addr().ok();
    writeln!(ui.stdout_formatter(), "Serving {} on {:?}", repo_root.display(), local_addr)
        .map_err(CommandError::from)?;

    let model = if args.threads == 0 {
        ConcurrencyModel::Sequential
    } else {
        ConcurrencyModel::ThreadPerConnection { max_workers: args.threads }
    };
    serve(listener, model, handler)?;
    Ok(())
}
