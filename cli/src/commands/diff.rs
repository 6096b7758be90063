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

//! `rvc diff` — a human-readable, unified-style diff of local
//! modifications against each file's pristine base text.
//!
//! No diffing crate is part of this workspace's dependency stack, so the
//! line grid below is hand-rolled: a classic longest-common-subsequence
//! table over lines, walked backwards to emit a minimal edit script. Good
//! enough for CLI display; not used by the wire protocol; the byte-level
//! delta encoding commit/update actually send stays in `dp::editor`'s
//! `diff_to_windows`.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use rvc_lib::rs::NodeKind;
use rvc_lib::wc::Schedule;
use rvc_lib::wc::Translator;

use crate::command_error::CommandError;
use crate::commands::Workspace;
use crate::commands::eol_strategy;
use crate::ui::Ui;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Working copy to diff (defaults to the current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Limit the diff to this repo-relative path.
    path: Option<String>,
}

pub fn run(ui: &mut Ui, cwd: &Path, args: DiffArgs) -> Result<(), CommandError> {
    let start = args.workspace.map(|p| cwd.join(p)).unwrap_or_else(|| cwd.to_path_buf());
    let workspace = Workspace::open(&start)?;
    let converter = workspace.ui_converter();

    let only = args
        .path
        .map(|p| converter.parse_file_path(&p))
        .transpose()
        .map_err(|e| CommandError::user(format!("{e}")))?;

    let mut out = ui.stdout_formatter();
    for (path, entry) in workspace.entries.walk_entries() {
        if entry.kind != NodeKind::File || entry.schedule != Schedule::Normal {
            continue;
        }
        if let Some(only) = &only
            && path.as_ref() != only.as_ref()
        {
            continue;
        }
        let Some(base_revision) = entry.base_revision else { continue };
        let fs_path = path.to_fs_path(&workspace.root).map_err(|_| {
            CommandError::internal(format!("{}: invalid working-copy path", path.as_internal_file_string()))
        })?;
        let Ok(raw) = std::fs::read(&fs_path) else { continue };
        let base_node = workspace.store.node_at(base_revision, path)?;
        let translator = Translator::new(eol_strategy(&base_node.properties), Vec::new(), false);
        let pristine = workspace.store.read_file(base_revision, path)?;
        let current = translator.to_repository_form(&raw)?;
        if current == pristine {
            continue;
        }
        let label = converter.format_file_path(path);
        write_unified_diff(&mut out, &label, &pristine, &current).map_err(CommandError::from)?;
    }
    Ok(())
}

fn write_unified_diff(out: &mut dyn std::io::Write, label: &str, old: &[u8], new: &[u8]) -> std::io::Result<()> {
    let old_lines: Vec<&[u8]> = split_lines(old);
    let new_lines: Vec<&[u8]> = split_lines(new);
    let ops = diff_lines(&old_lines, &new_lines);

    writeln!(out, "--- {label}")?;
    writeln!(out, "+++ {label}")?;
    for op in ops {
        match op {
            DiffOp::Equal(line) => writeln!(out, " {}", String::from_utf8_lossy(line))?,
            DiffOp::Remove(line) => writeln!(out, "-{}", String::from_utf8_lossy(line))?,
            DiffOp::Add(line) => writeln!(out, "+{}", String::from_utf8_lossy(line))?,
        }
    }
    Ok(())
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes.split_inclusive(|&b| b == b'\n').collect()
}

enum DiffOp<'a> {
    Equal(&'a [u8]),
    Remove(&'a [u8]),
    Add(&'a [u8]),
}

/// Minimal edit script between two line grids, via the textbook
/// dynamic-programming LCS table walked backwards.
fn diff_lines<'a>(old: &[&'a [u8]], new: &[&'a [u8]]) -> Vec<DiffOp<'a>> {
    let (m, n) = (old.len(), new.len());
    let mut table = vec![vec![0u32; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[i][j] = if old[i] == new[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if old[i] == new[j] {
            ops.push(DiffOp::Equal(old[i]));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            ops.push(DiffOp::Remove(old[i]));
            i += 1;
        } else {
            ops.push(DiffOp::Add(new[j]));
            j += 1;
        }
    }
    while i < m {
        ops.push(DiffOp::Remove(old[i]));
        i += 1;
    }
    while j < n {
        ops.push(DiffOp::Add(new[j]));
        j += 1;
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(old: &[u8], new: &[u8]) -> String {
        let mut buf = Vec::new();
        write_unified_diff(&mut buf, "f.txt", old, new).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn unchanged_content_has_no_add_or_remove_lines() {
        let out = render(b"a\nb\n", b"a\nb\n");
        assert!(!out.contains('+') && !out.contains('-') || out.lines().all(|l| !l.starts_with('+') && !l.starts_with('-')));
    }

    #[test]
    fn a_single_changed_line_shows_as_remove_then_add() {
        let out = render(b"a\nb\nc\n", b"a\nx\nc\n");
        assert!(out.contains("-b"));
        assert!(out.contains("+x"));
        assert!(out.contains(" a"));
        assert!(out.contains(" c"));
    }

    #[test]
    fn an_appended_line_shows_only_as_an_add() {
        let out = render(b"a\n", b"a\nb\n");
        assert!(out.contains("+b"));
        assert!(!out.contains("-a"));
    }
}
