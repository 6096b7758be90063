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

#[test]
fn update_brings_a_working_copy_forward_to_a_newer_revision() {
    let env = TestEnvironment::default();
    let root = env.work_dir(".");
    root.run_rvc(["admin", "create", "repo"]).success();
    root.run_rvc(["checkout", "repo", "wc"]).success();

    let wc = env.work_dir("wc");
    wc.write_file("a.txt", "v1\n");
    wc.run_rvc(["add", "a.txt"]).success();
    wc.run_rvc(["commit", "-m", "r1"]).success();

    // A second, independent working copy commits a further revision.
    root.run_rvc(["checkout", "repo", "wc2"]).success();
    let wc2 = env.work_dir("wc2");
    wc2.write_file("b.txt", "v1\n");
    wc2.run_rvc(["add", "b.txt"]).success();
    wc2.run_rvc(["commit", "-m", "r2"]).success();

    assert!(!wc.root().join("b.txt").exists());
    wc.run_rvc(["update"]).success();
    assert_eq!(wc.read_file("b.txt"), "v1\n");
    assert_eq!(wc.read_file("a.txt"), "v1\n");
}

#[test]
fn switch_re_points_the_working_copy_at_a_different_subtree() {
    let env = TestEnvironment::default();
    let root = env.work_dir(".");
    root.run_rvc(["admin", "create", "repo"]).success();
    root.run_rvc(["checkout", "repo", "wc"]).success();

    let wc = env.work_dir("wc");
    wc.write_file("trunk/a.txt", "trunk\n");
    wc.run_rvc(["add", "trunk"]).success();
    wc.run_rvc(["add", "trunk/a.txt"]).success();
    wc.run_rvc(["commit", "-m", "add trunk"]).success();

    wc.run_rvc(["switch", "trunk"]).success();
    assert_eq!(wc.read_file("a.txt"), "trunk\n");
}
