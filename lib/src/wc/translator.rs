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

//! The translator (C2d): bidirectional conversion between repository-normal
//! form (LF line endings, unexpanded keywords) and working form (the
//! configured EOL style, expanded keywords, and — for symlinks — an actual
//! platform symlink rather than a `link <target>` marker file).
//!
//! Grounded in the teacher's CRLF/LF conversion (`eol.rs`), extended here
//! with keyword expansion/contraction and symlink encoding, since svn-style
//! translation needs both and the teacher's working copy only needed EOL.

use bstr::ByteSlice as _;

use crate::error::ErrorKind;
use crate::error::RvcError;

/// The line-ending policy applied when materializing a file onto disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EolStrategy {
    /// Repository-normal form (LF) is used verbatim; no conversion.
    None,
    Lf,
    Crlf,
}

impl EolStrategy {
    fn working_terminator(self) -> Option<&'static [u8]> {
        match self {
            Self::None => None,
            Self::Lf => Some(b"\n"),
            Self::Crlf => Some(b"\r\n"),
        }
    }
}

/// A single `$Keyword$` substitution rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordSpec {
    pub name: String,
    pub value: Vec<u8>,
}

/// Detects whether `bytes` look binary, by the same heuristic as the
/// teacher's EOL translator: a NUL byte, or a lone `\r` not followed by
/// `\n`, marks content as binary and exempt from EOL conversion.
pub fn is_binary(bytes: &[u8]) -> bool {
    let mut iter = bytes.iter().peekable();
    while let Some(byte) = iter.next() {
        match *byte {
            b'\0' => return true,
            b'\r' if iter.peek() != Some(&&b'\n') => return true,
            _ => {}
        }
    }
    false
}

/// Converts EOLs in `contents` to `target`. A no-op if `contents` looks
/// binary or `target` is [`EolStrategy::None`].
fn convert_eol(contents: &[u8], target: EolStrategy) -> Vec<u8> {
    let Some(eol) = target.working_terminator() else {
        return contents.to_vec();
    };
    if is_binary(contents) {
        return contents.to_vec();
    }
    let mut out = Vec::with_capacity(contents.len());
    for line in contents.lines_with_terminator() {
        match line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n")) {
            Some(body) => {
                out.extend_from_slice(body);
                out.extend_from_slice(eol);
            }
            None => out.extend_from_slice(line),
        }
    }
    out
}

/// Normalizes `contents`' line endings to bare LF (repository-normal form).
fn normalize_eol_to_lf(contents: &[u8]) -> Vec<u8> {
    if is_binary(contents) {
        return contents.to_vec();
    }
    let mut out = Vec::with_capacity(contents.len());
    for line in contents.lines_with_terminator() {
        match line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n")) {
            Some(body) => {
                out.extend_from_slice(body);
                out.push(b'\n');
            }
            None => out.extend_from_slice(line),
        }
    }
    out
}

fn expand_keywords(contents: &[u8], keywords: &[KeywordSpec]) -> Vec<u8> {
    let mut text = contents.to_vec();
    for spec in keywords {
        let narrow = format!("${}$", spec.name);
        let expanded = {
            let mut v = format!("${}: ", spec.name).into_bytes();
            v.extend_from_slice(&spec.value);
            v.extend_from_slice(b" $");
            v
        };
        text = replace_all(&text, narrow.as_bytes(), &expanded);
    }
    text
}

fn contract_keywords(contents: &[u8], keywords: &[KeywordSpec]) -> Vec<u8> {
    let mut text = contents.to_vec();
    for spec in keywords {
        let prefix = format!("${}: ", spec.name).into_bytes();
        let narrow = format!("${}$", spec.name).into_bytes();
        text = contract_one(&text, &prefix, &narrow);
    }
    text
}

fn contract_one(text: &[u8], prefix: &[u8], narrow: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(prefix) {
        out.extend_from_slice(&rest[..start]);
        let after_prefix = &rest[start + prefix.len()..];
        if let Some(end) = after_prefix.find(b" $") {
            out.extend_from_slice(narrow);
            rest = &after_prefix[end + 2..];
        } else {
            // No closing marker on this line: leave it untouched.
            out.extend_from_slice(prefix);
            rest = after_prefix;
        }
    }
    out.extend_from_slice(rest);
    out
}

fn replace_all(text: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(from) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

const SYMLINK_MARKER: &[u8] = b"link ";

/// Converts between repository-normal and working form for one file.
#[derive(Clone, Debug)]
pub struct Translator {
    eol: EolStrategy,
    keywords: Vec<KeywordSpec>,
    is_symlink: bool,
}

impl Translator {
    pub fn new(eol: EolStrategy, keywords: Vec<KeywordSpec>, is_symlink: bool) -> Self {
        Self { eol, keywords, is_symlink }
    }

    /// Produces the bytes to write to the working file, from
    /// repository-normal `contents`.
    pub fn to_working_form(&self, contents: &[u8]) -> Result<Vec<u8>, RvcError> {
        if self.is_symlink {
            return Ok(contents.to_vec());
        }
        let expanded = expand_keywords(contents, &self.keywords);
        Ok(convert_eol(&expanded, self.eol))
    }

    /// Produces repository-normal bytes from the working file's `contents`.
    pub fn to_repository_form(&self, contents: &[u8]) -> Result<Vec<u8>, RvcError> {
        if self.is_symlink {
            return Ok(contents.to_vec());
        }
        let normalized = normalize_eol_to_lf(contents);
        Ok(contract_keywords(&normalized, &self.keywords))
    }

    /// Encodes a symlink `target` into the repository-normal blob form
    /// (`link <target>`), the form stored in the object store for symlink
    /// nodes whose host platform has no native symlink.
    pub fn encode_symlink(target: &str) -> Vec<u8> {
        let mut out = SYMLINK_MARKER.to_vec();
        out.extend_from_slice(target.as_bytes());
        out
    }

    /// Decodes a `link <target>` blob back into its target string.
    pub fn decode_symlink(contents: &[u8]) -> Result<String, RvcError> {
        let target = contents.strip_prefix(SYMLINK_MARKER).ok_or_else(|| {
            RvcError::tagged(ErrorKind::MalformedFile, "symlink content missing 'link ' marker")
        })?;
        String::from_utf8(target.to_vec())
            .map_err(|_| RvcError::tagged(ErrorKind::MalformedFile, "symlink target is not UTF-8"))
    }
}
