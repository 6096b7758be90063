// Copyright 2022 The Jujutsu Authors
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

//! CLI display configuration: color choice, pager, quiet, progress
//! indicator, and the `colors` label-to-style table.
//!
//! This is deliberately not built on `rvc_lib::config::StackedConfig`: that
//! type resolves a whole document into one fixed `RepositoryConfig` for
//! server-side access policy, a different concern from the handful of named
//! display settings the CLI needs. Layering (default < user < repo < env) is
//! still TOML-document-merge-then-deserialize-once, same shape as the
//! library's loader, just over a CLI-shaped document.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use crate::command_error::CommandError;
use crate::formatter::Style;

const DEFAULT_CONFIG_TOML: &str = r#"
[ui]
color = "auto"
paginate = true
pager = "less -FRX"
quiet = false
progress-indicator = true

[colors]
error = "red"
warning = "yellow"
hint = "cyan"
heading = { bold = true }
"#;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorChoice {
    Always,
    Never,
    Debug,
    #[default]
    Auto,
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::Debug => "debug",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// A pager (or other external command) name and arguments, as configured.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommandNameAndArgs {
    String(String),
    Vec(Vec<String>),
}

impl CommandNameAndArgs {
    pub fn split_name(&self) -> &str {
        match self {
            // unwrap: split always yields at least one item, even for "".
            Self::String(s) => s.split(' ').next().unwrap(),
            Self::Vec(a) => a.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Vec(_) => None,
        }
    }

    pub fn to_command(&self) -> Command {
        match self {
            Self::String(s) => {
                let mut parts = s.split(' ').filter(|s| !s.is_empty());
                let name = parts.next().unwrap_or("");
                let mut cmd = Command::new(name);
                cmd.args(parts);
                cmd
            }
            Self::Vec(a) => {
                let mut cmd = Command::new(a.first().map(String::as_str).unwrap_or(""));
                if a.len() > 1 {
                    cmd.args(&a[1..]);
                }
                cmd
            }
        }
    }
}

impl fmt::Display for CommandNameAndArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Vec(a) => write!(f, "{}", a.join(" ")),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Named(String),
    Style(Style),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct UiSection {
    color: ColorChoice,
    paginate: bool,
    pager: Option<CommandNameAndArgs>,
    quiet: bool,
    #[serde(rename = "progress-indicator")]
    progress_indicator: bool,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            color: ColorChoice::Auto,
            paginate: true,
            pager: None,
            quiet: false,
            progress_indicator: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDoc {
    ui: UiSection,
    colors: BTreeMap<String, ColorValue>,
}

/// Resolved CLI display configuration.
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub color: ColorChoice,
    pub paginate: bool,
    pub pager: CommandNameAndArgs,
    pub quiet: bool,
    pub progress_indicator: bool,
    pub color_rules: Vec<(Vec<String>, Style)>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::from_merged_toml(DEFAULT_CONFIG_TOML).expect("built-in default config must parse")
    }
}

impl CliConfig {
    /// Loads the default config overlaid with user and repo config files (in
    /// that precedence order), then environment variable overrides.
    pub fn from_environment(
        user_config_path: Option<&Path>,
        repo_config_path: Option<&Path>,
    ) -> Result<Self, CommandError> {
        let mut merged = toml_edit::DocumentMut::new();
        merge_toml_str(&mut merged, DEFAULT_CONFIG_TOML)
            .map_err(|e| CommandError::config(e.to_string()))?;
        for path in [user_config_path, repo_config_path].into_iter().flatten() {
            if let Ok(text) = std::fs::read_to_string(path) {
                merge_toml_str(&mut merged, &text)
                    .map_err(|e| CommandError::config(format!("{}: {e}", path.display())))?;
            }
        }
        apply_env_overrides(&mut merged);
        Self::from_merged_toml(&merged.to_string()).map_err(|e| CommandError::config(e.to_string()))
    }

    fn from_merged_toml(text: &str) -> Result<Self, toml_edit::de::Error> {
        let doc: RawDoc = toml_edit::de::from_str(text)?;
        let color_rules = doc
            .colors
            .into_iter()
            .map(|(key, value)| {
                let labels = key.split_whitespace().map(str::to_owned).collect();
                let style = match value {
                    ColorValue::Named(name) => Style {
                        fg: Some(name),
                        ..Style::default()
                    },
                    ColorValue::Style(style) => style,
                };
                (labels, style)
            })
            .collect();
        Ok(Self {
            color: doc.ui.color,
            paginate: doc.ui.paginate,
            pager: doc.ui.pager.unwrap_or(CommandNameAndArgs::String("less -FRX".to_owned())),
            quiet: doc.ui.quiet,
            progress_indicator: doc.ui.progress_indicator,
            color_rules,
        })
    }
}

/// Merges a TOML document's top-level `[ui]` keys and `[colors]` entries into
/// `base`, with `text`'s values taking precedence. Unlike a recursive deep
/// merge, `colors` entries are merged key-by-key (so one config file can add
/// colors without repeating another file's whole table) while unknown
/// top-level tables are copied over verbatim.
fn merge_toml_str(base: &mut toml_edit::DocumentMut, text: &str) -> Result<(), toml_edit::TomlError> {
    let incoming: toml_edit::DocumentMut = text.parse()?;
    for (key, item) in incoming.iter() {
        if key == "colors" {
            let colors = base
                .entry("colors")
                .or_insert(toml_edit::Item::Table(toml_edit::Table::new()));
            if let (Some(dst), Some(src)) = (colors.as_table_mut(), item.as_table()) {
                for (k, v) in src.iter() {
                    dst.insert(k, v.clone());
                }
            }
        } else if key == "ui" {
            let ui = base
                .entry("ui")
                .or_insert(toml_edit::Item::Table(toml_edit::Table::new()));
            if let (Some(dst), Some(src)) = (ui.as_table_mut(), item.as_table()) {
                for (k, v) in src.iter() {
                    dst.insert(k, v.clone());
                }
            }
        } else {
            base.insert(key, item.clone());
        }
    }
    Ok(())
}

/// `NO_COLOR`/`PAGER` follow the same ambient conventions the teacher's own
/// environment-layer honored, kept minimal to just what this CLI surfaces.
fn apply_env_overrides(doc: &mut toml_edit::DocumentMut) {
    if !env::var("NO_COLOR").unwrap_or_default().is_empty() {
        doc["ui"]["color"] = toml_edit::value("never");
    }
    if let Ok(value) = env::var("PAGER") {
        doc["ui"]["pager"] = toml_edit::value(value);
    }
    if let Ok(value) = env::var("RVC_PAGER") {
        doc["ui"]["pager"] = toml_edit::value(value);
    }
}

/// Resolves the user-level config file path: `$RVC_CONFIG`, else
/// `$XDG_CONFIG_HOME/rvc/config.toml`, else `~/.config/rvc/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("RVC_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| env::var("HOME").map(|h| Path::new(&h).join(".config")).ok())?;
    Some(config_home.join("rvc").join("config.toml"))
}

/// Interpolates `$name` placeholders in pager/editor-style argument lists.
pub fn interpolate_variables<V: AsRef<str>>(
    args: &[String],
    variables: &HashMap<&str, V>,
) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut out = String::with_capacity(arg.len());
            let mut rest = arg.as_str();
            while let Some(pos) = rest.find('$') {
                out.push_str(&rest[..pos]);
                let after = &rest[pos + 1..];
                let end = after
                    .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
                    .unwrap_or(after.len());
                let name = &after[..end];
                if let Some(subst) = variables.get(name) {
                    out.push_str(subst.as_ref());
                } else {
                    out.push('$');
                    out.push_str(name);
                }
                rest = &after[end..];
            }
            out.push_str(rest);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = CliConfig::default();
        assert_eq!(config.color, ColorChoice::Auto);
        assert!(config.paginate);
        assert!(!config.quiet);
        assert!(config.progress_indicator);
        assert!(config.color_rules.iter().any(|(labels, _)| labels == &["error".to_owned()]));
    }

    #[test]
    fn user_overrides_merge_into_defaults() {
        let mut merged = toml_edit::DocumentMut::new();
        merge_toml_str(&mut merged, DEFAULT_CONFIG_TOML).unwrap();
        merge_toml_str(&mut merged, "[ui]\nquiet = true\n[colors]\nfoo = \"green\"\n").unwrap();
        let config = CliConfig::from_merged_toml(&merged.to_string()).unwrap();
        assert!(config.quiet);
        // original defaults survive alongside the new key.
        assert!(config.color_rules.iter().any(|(labels, _)| labels == &["error".to_owned()]));
        assert!(config.color_rules.iter().any(|(labels, _)| labels == &["foo".to_owned()]));
    }

    #[test]
    fn interpolate_substitutes_known_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([("left", "LEFT"), ("right", "RIGHT")]);
        let args = vec!["$left".to_owned(), "mid".to_owned(), "$right$unknown".to_owned()];
        let out = interpolate_variables(&args, &vars);
        assert_eq!(out, vec!["LEFT", "mid", "RIGHT$unknown"]);
    }
}
