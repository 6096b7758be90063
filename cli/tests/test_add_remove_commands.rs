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

use crate::common::OutputExt as _;
use crate::common::TestEnvironment;

fn fresh_checkout(env: &TestEnvironment) -> crate::common::WorkDir {
    let root = env.work_dir(".");
    root.run_rvc(["admin", "create", "repo"]).success();
    root.run_rvc(["checkout", "repo", "wc"]).success();
    env.work_dir("wc")
}

#[test]
fn adding_a_new_file_then_committing_publishes_it() {
    let env = TestEnvironment::default();
    let wc = fresh_checkout(&env);

    wc.write_file("a.txt", "hello\n");
    let add_out = wc.run_rvc(["add", "a.txt"]);
    add_out.success();
    assert!(add_out.stdout_string().contains("A"));

    let commit_out = wc.run_rvc(["commit", "-m", "add a"]);
    commit_out.success();
    assert!(commit_out.stdout_string().contains("Committed revision"));

    let status_out = wc.run_rvc(["status"]);
    status_out.success();
    assert_eq!(status_out.stdout_string(), "");
}

#[test]
fn adding_an_already_tracked_path_is_reported_rather_than_failing() {
    let env = TestEnvironment::default();
    let wc = fresh_checkout(&env);
    wc.write_file("a.txt", "hello\n");
    wc.run_rvc(["add", "a.txt"]).success();

    let second = wc.run_rvc(["add", "a.txt"]);
    second.success();
    assert!(second.stdout_string().contains("already under version control"));
}

#[test]
fn removing_a_committed_file_schedules_its_deletion_and_commit_drops_it() {
    let env = TestEnvironment::default();
    let wc = fresh_checkout(&env);
    wc.write_file("a.txt", "hello\n");
    wc.run_rvc(["add", "a.txt"]).success();
    wc.run_rvc(["commit", "-m", "add a"]).success();

    let remove_out = wc.run_rvc(["remove", "a.txt"]);
    remove_out.success();
    assert!(!wc.root().join("a.txt").exists());

    let status_out = wc.run_rvc(["status"]);
    status_out.success();
    assert!(status_out.stdout_string().contains("D       a.txt"));

    wc.run_rvc(["commit", "-m", "remove a"]).success();
    let status_after_commit = wc.run_rvc(["status"]);
    status_after_commit.success();
    assert_eq!(status_after_commit.stdout_string(), "");
}

#[test]
fn removing_a_not_yet_committed_add_simply_unschedules_it() {
    let env = TestEnvironment::default();
    let wc = fresh_checkout(&env);
    wc.write_file("a.txt", "hello\n");
    wc.run_rvc(["add", "a.txt"]).success();

    wc.run_rvc(["remove", "a.txt"]).success();
    assert!(!wc.root().join("a.txt").exists());

    let status_out = wc.run_rvc(["status"]);
    status_out.success();
    assert_eq!(status_out.stdout_string(), "");
}
