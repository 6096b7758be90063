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

use rvc_lib::wc::EolStrategy;
use rvc_lib::wc::KeywordSpec;
use rvc_lib::wc::Translator;

#[test]
fn crlf_strategy_materializes_repository_normal_lf_text_as_crlf() {
    let translator = Translator::new(EolStrategy::Crlf, Vec::new(), false);
    let working = translator.to_working_form(b"a\nb\nc\n").unwrap();
    assert_eq!(working, b"a\r\nb\r\nc\r\n");
}

#[test]
fn round_tripping_through_working_form_and_back_preserves_lf_content() {
    let translator = Translator::new(EolStrategy::Crlf, Vec::new(), false);
    let original = b"a\nb\nc\n";
    let working = translator.to_working_form(original).unwrap();
    let back = translator.to_repository_form(&working).unwrap();
    assert_eq!(back, original);
}

#[test]
fn binary_content_is_never_eol_translated() {
    let translator = Translator::new(EolStrategy::Crlf, Vec::new(), false);
    let binary = b"a\0b\nc\n";
    let working = translator.to_working_form(binary).unwrap();
    assert_eq!(working, binary);
}

#[test]
fn a_keyword_is_expanded_in_working_form_and_contracted_back() {
    let keywords = vec![KeywordSpec { name: "Id".to_string(), value: b"abc123".to_vec() }];
    let translator = Translator::new(EolStrategy::None, keywords, false);
    let repository_form = b"header $Id$ trailer\n";

    let working = translator.to_working_form(repository_form).unwrap();
    assert!(working.windows(b"abc123".len()).any(|w| w == b"abc123"));

    let back = translator.to_repository_form(&working).unwrap();
    assert_eq!(back, repository_form);
}

#[test]
fn symlink_targets_round_trip_through_the_marker_encoding() {
    let encoded = Translator::encode_symlink("../other/path");
    let decoded = Translator::decode_symlink(&encoded).unwrap();
    assert_eq!(decoded, "../other/path");
}
