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

use assert_matches::assert_matches;
use rvc_lib::RvcError;
use testutils::TestStore;
use testutils::commit_tree;
use testutils::repo_path;

#[test]
fn a_transaction_started_against_a_stale_base_is_rejected_at_commit() {
    let mut test_store = TestStore::init();
    commit_tree(&mut test_store.store, &[("a.txt", "original")]);

    let mut stale_txn = test_store.store.begin_txn();

    // A second transaction touches the same file and commits first.
    let mut other_txn = test_store.store.begin_txn();
    other_txn.write_contents(repo_path("a.txt"), b"raced ahead").unwrap();
    other_txn.commit(Default::default()).unwrap();

    stale_txn.write_contents(repo_path("a.txt"), b"based on stale data").unwrap();
    let result = stale_txn.commit(Default::default());
    assert_matches!(result, Err(RvcError::OutOfDate { .. }));
}

#[test]
fn touching_unrelated_files_in_concurrent_transactions_does_not_conflict() {
    let mut test_store = TestStore::init();
    commit_tree(&mut test_store.store, &[("a.txt", "a"), ("b.txt", "b")]);

    let mut txn_a = test_store.store.begin_txn();
    let mut txn_b = test_store.store.begin_txn();
    txn_a.write_contents(repo_path("a.txt"), b"a2").unwrap();
    txn_b.write_contents(repo_path("b.txt"), b"b2").unwrap();

    txn_a.commit(Default::default()).unwrap();
    let revision = txn_b.commit(Default::default()).unwrap();

    assert_eq!(test_store.store.read_file(revision, repo_path("a.txt")).unwrap(), b"a2");
    assert_eq!(test_store.store.read_file(revision, repo_path("b.txt")).unwrap(), b"b2");
}

#[test]
fn deleting_a_file_removes_it_from_the_next_revision() {
    let mut test_store = TestStore::init();
    commit_tree(&mut test_store.store, &[("a.txt", "a")]);

    let mut txn = test_store.store.begin_txn();
    txn.delete(repo_path("a.txt")).unwrap();
    let revision = txn.commit(Default::default()).unwrap();

    assert!(test_store.store.node_at(revision, repo_path("a.txt")).is_err());
}

#[test]
fn a_property_set_on_a_file_is_visible_on_the_committed_node() {
    let mut test_store = TestStore::init();
    commit_tree(&mut test_store.store, &[("a.txt", "a")]);

    let mut txn = test_store.store.begin_txn();
    txn.set_prop(repo_path("a.txt"), "rvc:eol", Some(b"lf".to_vec())).unwrap();
    let revision = txn.commit(Default::default()).unwrap();

    let node = test_store.store.node_at(revision, repo_path("a.txt")).unwrap();
    assert_eq!(node.properties.get("rvc:eol").map(Vec::as_slice), Some(b"lf".as_slice()));
}
