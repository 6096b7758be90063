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

mod test_eol;
mod test_merge_driver;
mod test_transaction;

#[test]
fn no_forgotten_test_files() {
    testutils::assert_no_forgotten_test_files(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").as_path());
}
