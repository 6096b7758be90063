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

//! Core engine for `rvc`, a centralized version-control system.
//!
//! Three layers, matching the component table of the design this crate
//! implements:
//!
//! - [`rs`]: the revision store — an append-only sequence of immutable
//!   revisions, an object store beneath them, and the copy-on-write
//!   transaction manager that produces new revisions.
//! - [`wc`]: the working-copy engine — per-entry metadata, a crash-safe work
//!   queue, local-modification detection, and the EOL/keyword/symlink
//!   translator between repository-normal and working form.
//! - [`dp`]: the delta protocol — the tree-editor callback contract, the
//!   report reconciler that drives a mixed-revision update, the merge
//!   driver, the commit driver, and the wire protocol and server loop that
//!   carry all of it over a connection.
//!
//! [`error`] and [`config`] are shared infrastructure; [`repo_path`] and
//! [`file_util`] are generic path/filesystem utilities used by every layer.

pub mod config;
pub mod dp;
pub mod error;
pub mod file_util;
pub mod repo_path;
pub mod rs;
pub mod wc;

pub use error::ErrorKind;
pub use error::Result;
pub use error::RvcError;

#[cfg(test)]
pub(crate) mod tests {
    /// Creates a temporary directory for tests that need a real filesystem.
    pub fn new_temp_dir() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("rvc-test-")
            .tempdir()
            .unwrap()
    }
}
