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

//! The delta protocol (C3): the tree editor interface, the report
//! reconciler, the three-way merge driver, the commit driver, and the wire
//! protocol that carries them between client and server.

pub mod commit_driver;
pub mod editor;
pub mod handler;
pub mod merge_driver;
pub mod report;
pub mod server;
pub mod wire;

pub use commit_driver::CommitCandidate;
pub use commit_driver::PostcommitItem;
pub use commit_driver::PropChange;
pub use commit_driver::StateFlags;
pub use commit_driver::common_base_path;
pub use commit_driver::drive_commit;
pub use editor::CopyFrom;
pub use editor::DirHandle;
pub use editor::FileHandle;
pub use editor::HandleAllocator;
pub use editor::TextDeltaOp;
pub use editor::TextDeltaWindow;
pub use editor::TreeEditor;
pub use editor::apply_windows;
pub use editor::diff_to_windows;
pub use handler::RepoCommandHandler;
pub use merge_driver::ConflictArtifacts;
pub use merge_driver::DirEntryMergeResult;
pub use merge_driver::FileMergeResult;
pub use merge_driver::PropMergeResult;
pub use merge_driver::TextMergeOracle;
pub use merge_driver::TextMergeOutcome;
pub use merge_driver::merge_dir_entry;
pub use merge_driver::merge_file;
pub use merge_driver::merge_prop;
pub use report::Depth;
pub use report::Reconciler;
pub use report::Report;
pub use wire::AccessLevel;
pub use wire::AuthMechanism;
pub use wire::Command;
pub use wire::CoreCommand;
pub use wire::Greeting;
pub use wire::ReportCommand;
pub use wire::WireReader;
pub use wire::WireValue;
pub use wire::cram_md5_response;
pub use wire::encode;
pub use wire::failure_response;
pub use wire::success_response;
pub use server::CommandHandler;
pub use server::ConcurrencyModel;
pub use server::handle_connection;
pub use server::serve;
pub use server::serve_process_per_connection;
pub use server::serve_sequential;
pub use server::serve_thread_per_connection;
