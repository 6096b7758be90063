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

//! Working-copy entry metadata (§3, §4.3).

use serde::Deserialize;
use serde::Serialize;

use crate::rs::NodeKind;
use crate::rs::Revision;

/// The local scheduling state of an entry, layered on top of its committed
/// base revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Schedule {
    /// No local change: the entry matches its base revision modulo ordinary
    /// edits tracked by the local-modification detector.
    Normal,
    /// Scheduled to be added at the next commit. Has no base revision.
    Added,
    /// Scheduled to be deleted at the next commit.
    Deleted,
    /// Deleted then re-added at the same path (e.g. file replaced by a
    /// directory); commit must emit a delete followed by an add.
    Replaced,
}

/// A cheap fingerprint of an entry's recorded state, used by the
/// local-modification detector to short-circuit the expensive byte-for-byte
/// comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: Option<u64>,
    pub mtime_secs: Option<i64>,
    pub mtime_nanos: Option<u32>,
}

/// Per-entry metadata held in the entry database (§4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WcEntry {
    pub kind: NodeKind,
    pub schedule: Schedule,
    /// The revision this entry's text/properties were last updated from.
    /// `None` for an entry scheduled [`Schedule::Added`].
    pub base_revision: Option<Revision>,
    /// Fingerprint of the text as last recorded (post-translation, i.e. as
    /// the file sits on disk).
    pub text_fingerprint: Fingerprint,
    /// Fingerprint of the property set as last recorded.
    pub prop_fingerprint: Fingerprint,
    /// True if this entry was brought in by a `switch` to a different URL
    /// than its parent.
    pub switched: bool,
    /// True if the entry is known to the metadata store but deliberately not
    /// present on disk (e.g. depth-limited checkout).
    pub absent: bool,
    /// File names of unresolved conflict artifacts (`.mine`, `.rOLD`,
    /// `.rNEW`, `.prej`), relative to the entry's parent directory.
    pub conflict_artifacts: Vec<String>,
    /// Copy-from source path, if this entry was scheduled via a copy rather
    /// than a plain add.
    pub copyfrom_path: Option<String>,
    pub copyfrom_revision: Option<Revision>,
}

impl WcEntry {
    pub fn normal(kind: NodeKind, base_revision: Revision) -> Self {
        Self {
            kind,
            schedule: Schedule::Normal,
            base_revision: Some(base_revision),
            text_fingerprint: Fingerprint::default(),
            prop_fingerprint: Fingerprint::default(),
            switched: false,
            absent: false,
            conflict_artifacts: Vec::new(),
            copyfrom_path: None,
            copyfrom_revision: None,
        }
    }

    pub fn added(kind: NodeKind) -> Self {
        Self {
            kind,
            schedule: Schedule::Added,
            base_revision: None,
            text_fingerprint: Fingerprint::default(),
            prop_fingerprint: Fingerprint::default(),
            switched: false,
            absent: false,
            conflict_artifacts: Vec::new(),
            copyfrom_path: None,
            copyfrom_revision: None,
        }
    }

    pub fn has_conflict(&self) -> bool {
        !self.conflict_artifacts.is_empty()
    }
}
