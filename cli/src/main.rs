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

mod command_error;
mod commands;
mod config;
mod formatter;
mod ui;

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use itertools::Itertools as _;

use crate::command_error::CommandError;
use crate::config::CliConfig;
use crate::config::user_config_path;
use crate::ui::Ui;

/// Centralized, history-preserving version control.
#[derive(Parser, Debug)]
#[command(name = "rvc", version, about)]
struct Cli {
    /// Increase logging verbosity (-v, -vv). Equivalent to raising the
    /// default level of the `RVC_LOG` filter.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the configured color behavior.
    #[arg(long, global = true, value_enum)]
    color: Option<config::ColorChoice>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Administrative operations on a repository.
    #[command(subcommand)]
    Admin(commands::admin::AdminCommand),
    /// Check out a subtree of a repository into a new working copy.
    Checkout(commands::checkout::CheckoutArgs),
    /// Schedule paths for addition at the next commit.
    Add(commands::add::AddArgs),
    /// Schedule versioned paths for deletion at the next commit.
    Remove(commands::remove::RemoveArgs),
    /// Switch the checked-out subtree or revision without a fresh checkout.
    Switch(commands::switch::SwitchArgs),
    /// Bring the working copy up to date with a revision.
    Update(commands::update::UpdateArgs),
    /// Publish local changes as a new revision.
    Commit(commands::commit::CommitArgs),
    /// Show local modifications relative to the working copy's base revision.
    Status(commands::status::StatusArgs),
    /// Show a line-based diff of local modifications.
    Diff(commands::diff::DiffArgs),
    /// Show revision history.
    Log(commands::log::LogArgs),
    /// Discard local modifications, restoring pristine content.
    Revert(commands::revert::RevertArgs),
    /// Run the repository server.
    Serve(commands::serve::ServeArgs),
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::filter::LevelFilter;

    let default_level = match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("RVC_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(ui: &mut Ui, cli: Cli) -> Result<(), CommandError> {
    let cwd = std::env::current_dir()?;
    match cli.command {
        Command::Admin(args) => commands::admin::run(ui, &cwd, args),
        Command::Checkout(args) => commands::checkout::run(ui, &cwd, args),
        Command::Add(args) => commands::add::run(ui, &cwd, args),
        Command::Remove(args) => commands::remove::run(ui, &cwd, args),
        Command::Switch(args) => commands::switch::run(ui, &cwd, args),
        Command::Update(args) => commands::update::run(ui, &cwd, args),
        Command::Commit(args) => commands::commit::run(ui, &cwd, args),
        Command::Status(args) => commands::status::run(ui, &cwd, args),
        Command::Diff(args) => commands::diff::run(ui, &cwd, args),
        Command::Log(args) => commands::log::run(ui, &cwd, args),
        Command::Revert(args) => commands::revert::run(ui, &cwd, args),
        Command::Serve(args) => commands::serve::run(ui, &cwd, args),
    }
}

fn print_error(ui: &Ui, err: &CommandError) {
    let chain = std::iter::successors(Some(err as &dyn Error), |e| e.source()).map(|e| e.to_string());
    let message = chain.collect_vec().join(": ");
    let mut formatter = ui.error_with_heading("Error");
    let _ = writeln!(formatter, "{message}");
    drop(formatter);
    if let Some(hint) = err.hint() {
        let mut hint_formatter = ui.hint_with_heading("Hint");
        let _ = writeln!(hint_formatter, "{hint}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo_config_path: Option<PathBuf> = None;
    let config = match CliConfig::from_environment(user_config_path().as_deref(), repo_config_path.as_deref()) {
        Ok(mut config) => {
            if cli.quiet {
                config.quiet = true;
            }
            if let Some(color) = cli.color {
                config.color = color;
            }
            config
        }
        Err(err) => {
            eprintln!("Error: {err}");
            return err.exit_code();
        }
    };

    let mut ui = match Ui::with_config(&config) {
        Ok(ui) => ui,
        Err(err) => {
            eprintln!("Error: {err}");
            return err.exit_code();
        }
    };

    match run(&mut ui, cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&ui, &err);
            err.exit_code()
        }
    }
}
