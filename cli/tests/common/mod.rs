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

use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::process::Output;

use tempfile::TempDir;

/// A scratch directory that subcommands run against, grounded on the same
/// "temp root + current_dir a binary subprocess at" shape the upstream jj
/// CLI test harness uses, simplified for a single binary with no git/config
/// normalization machinery to carry over.
pub struct TestEnvironment {
    _temp_dir: TempDir,
    env_root: PathBuf,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        let temp_dir = testutils::new_temp_dir();
        let env_root = temp_dir.path().to_path_buf();
        Self { _temp_dir: temp_dir, env_root }
    }
}

impl TestEnvironment {
    pub fn env_root(&self) -> &Path {
        &self.env_root
    }

    pub fn work_dir(&self, root: impl AsRef<Path>) -> WorkDir {
        WorkDir { root: self.env_root.join(root) }
    }
}

pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_file(&self, name: &str, contents: impl AsRef<[u8]>) {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.root.join(name)).unwrap()
    }

    /// Runs `rvc args..` in this directory and returns its raw output.
    #[must_use = "either assert success() or inspect stdout/stderr"]
    pub fn run_rvc<I, S>(&self, args: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = assert_cmd::Command::cargo_bin("rvc").unwrap();
        cmd.current_dir(&self.root);
        cmd.args(args);
        cmd.output().unwrap()
    }
}

pub trait OutputExt {
    fn success(&self) -> &Self;
    fn stdout_string(&self) -> String;
    fn stderr_string(&self) -> String;
}

impl OutputExt for Output {
    fn success(&self) -> &Self {
        assert!(
            self.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            self.status,
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr),
        );
        self
    }

    fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
