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

//! The revision store (C1 in the component table): object store, property
//! tables, checksums, and the copy-on-write transaction manager.

pub mod checksum;
pub mod key_gen;
pub mod props;
pub mod repo;
pub mod store;
pub mod transaction;
pub mod tree;
pub mod txn_editor;

pub use checksum::Checksums;
pub use checksum::StrongChecksum;
pub use checksum::WeakChecksum;
pub use props::PropTable;
pub use repo::RevisionStore;
pub use store::ObjectKey;
pub use store::ObjectStore;
pub use transaction::Transaction;
pub use txn_editor::TransactionTreeEditor;
pub use tree::Node;
pub use tree::NodeId;
pub use tree::NodeKind;
pub use tree::NodePayload;
pub use tree::Revision;
