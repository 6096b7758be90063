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

//! Layered repository configuration (§6, §10.3).
//!
//! A [`StackedConfig`] holds ordered TOML layers; later layers override
//! earlier ones key-by-key. [`RepositoryConfig`] is the typed view
//! materialized from the stack once per process, not re-parsed per access.
//! Unrecognized sections/keys are ignored; malformed TOML is a fatal startup
//! error, never silently defaulted.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use toml_edit::DocumentMut;

use crate::error::ErrorKind;
use crate::error::RvcError;

/// The source a config layer was loaded from, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigLayerSource {
    Default,
    Repo,
    User,
    Env,
    Cli,
}

struct ConfigLayer {
    source: ConfigLayerSource,
    document: DocumentMut,
}

/// An ordered stack of TOML documents, merged low-to-high precedence.
pub struct StackedConfig {
    layers: Vec<ConfigLayer>,
}

impl StackedConfig {
    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }

    /// Loads the built-in defaults. Never fails: the defaults are a
    /// compile-time constant and are checked by a unit test below.
    pub fn with_defaults() -> Self {
        let mut config = Self::empty();
        config
            .load_layer(ConfigLayerSource::Default, DEFAULT_CONFIG_TOML)
            .expect("built-in default config is valid TOML");
        config
    }

    /// Parses `text` as TOML and pushes it as a new layer, replacing any
    /// existing layer from the same [`ConfigLayerSource`].
    pub fn load_layer(&mut self, source: ConfigLayerSource, text: &str) -> Result<(), RvcError> {
        let document: DocumentMut = text.parse().map_err(|e| {
            RvcError::tagged_with_source(
                ErrorKind::MalformedFile,
                format!("malformed config ({source:?})"),
                TomlParseError(e),
            )
        })?;
        self.layers.retain(|l| l.source != source);
        self.layers.push(ConfigLayer { source, document });
        self.layers.sort_by_key(|l| layer_rank(l.source));
        Ok(())
    }

    /// Reads and parses the config file at `path` as a layer, if it exists.
    /// A missing file is not an error (most layers are optional); a present
    /// but malformed file is.
    pub fn load_layer_file(&mut self, source: ConfigLayerSource, path: &Path) -> Result<(), RvcError> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_layer(source, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RvcError::io(path.to_path_buf(), e)),
        }
    }

    /// Merges all layers (lowest precedence first) into one document and
    /// materializes it as a typed [`RepositoryConfig`].
    pub fn resolve(&self) -> Result<RepositoryConfig, RvcError> {
        let mut merged = toml_edit::Table::new();
        for layer in &self.layers {
            merge_tables(&mut merged, &layer.document);
        }
        toml_edit::de::from_str(&merged.to_string())
            .map_err(|e| RvcError::tagged_with_source(ErrorKind::MalformedFile, "config does not match schema", e))
    }
}

impl Default for StackedConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn layer_rank(source: ConfigLayerSource) -> u8 {
    match source {
        ConfigLayerSource::Default => 0,
        ConfigLayerSource::Repo => 1,
        ConfigLayerSource::User => 2,
        ConfigLayerSource::Env => 3,
        ConfigLayerSource::Cli => 4,
    }
}

fn merge_tables(base: &mut toml_edit::Table, overlay: &toml_edit::Table) {
    for (key, value) in overlay.iter() {
        match (base.get_mut(key), value.as_table()) {
            (Some(existing), Some(overlay_table)) if existing.is_table() => {
                merge_tables(existing.as_table_mut().expect("just checked"), overlay_table);
            }
            _ => {
                base.insert(key, value.clone());
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TomlParseError(toml_edit::TomlError);

/// Who may perform a class of operation against a repository.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    None,
    #[default]
    Read,
    Write,
}

/// The default end-of-line translation policy, before per-path `rvc:eol`
/// property overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultEolPolicy {
    #[default]
    Native,
    Lf,
    Crlf,
    CrlfCr,
}

/// The resolved, typed configuration of a repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepositoryConfig {
    pub anon_access: AccessLevel,
    pub auth_access: AccessLevel,
    pub password_db: Option<PathBuf>,
    pub realm: String,
    pub default_eol: DefaultEolPolicy,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            anon_access: AccessLevel::Read,
            auth_access: AccessLevel::Write,
            password_db: None,
            realm: String::new(),
            default_eol: DefaultEolPolicy::Native,
        }
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"
anon-access = "read"
auth-access = "write"
realm = ""
default-eol = "native"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_builtin_defaults_resolve_without_error() {
        let config = StackedConfig::with_defaults();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.anon_access, AccessLevel::Read);
        assert_eq!(resolved.auth_access, AccessLevel::Write);
    }

    #[test]
    fn a_later_layer_overrides_an_earlier_one() {
        let mut config = StackedConfig::with_defaults();
        config
            .load_layer(ConfigLayerSource::Repo, "anon-access = \"none\"\n")
            .unwrap();
        assert_eq!(config.resolve().unwrap().anon_access, AccessLevel::None);
    }

    #[test]
    fn malformed_toml_is_rejected_rather_than_silently_defaulted() {
        let mut config = StackedConfig::empty();
        let err = config.load_layer(ConfigLayerSource::Repo, "not valid [[[ toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFile);
    }

    #[test]
    fn unrecognized_keys_are_ignored_rather_than_rejected() {
        let mut config = StackedConfig::with_defaults();
        config
            .load_layer(ConfigLayerSource::Repo, "totally-unknown-key = 42\n")
            .unwrap();
        config.resolve().unwrap();
    }

    #[test]
    fn a_missing_layer_file_is_not_an_error() {
        let mut config = StackedConfig::with_defaults();
        config
            .load_layer_file(ConfigLayerSource::User, Path::new("/no/such/file/rvc.toml"))
            .unwrap();
    }
}
