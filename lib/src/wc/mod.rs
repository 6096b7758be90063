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

//! The working-copy engine (C2 in the component table): entry metadata
//! store, work queue, local-modification detector, translator, and the
//! per-working-copy advisory lock.

pub mod detector;
pub mod entry;
pub mod entry_store;
pub mod fs_editor;
pub mod lock;
pub mod translator;
pub mod work_queue;

pub use detector::ModificationStatus;
pub use entry::Fingerprint;
pub use entry::Schedule;
pub use entry::WcEntry;
pub use entry_store::EntryStore;
pub use fs_editor::FsTreeEditor;
pub use lock::WcLock;
pub use translator::EolStrategy;
pub use translator::KeywordSpec;
pub use translator::Translator;
pub use work_queue::WorkItem;
pub use work_queue::WorkQueue;
