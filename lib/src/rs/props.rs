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

//! Property-table serialization.
//!
//! A table is a mapping from short names to arbitrary byte strings. On disk
//! it's a sequence of `K <len>\n<name>\nV <len>\n<value>\n` records terminated
//! by the literal `END\n`. This is the format every node's property map, and
//! every revision's revprop table, is persisted in.

use std::collections::BTreeMap;

use crate::error::ErrorKind;
use crate::error::RvcError;

/// A property table: name to byte-string value.
pub type PropTable = BTreeMap<String, Vec<u8>>;

const MAX_LINE_LEN: usize = 100;

/// Serializes `props` into the `K`/`V`/`END` record format.
pub fn serialize_props(props: &PropTable) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in props {
        out.extend_from_slice(b"K ");
        out.extend_from_slice(name.len().to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(b"V ");
        out.extend_from_slice(value.len().to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(value);
        out.push(b'\n');
    }
    out.extend_from_slice(b"END\n");
    out
}

/// Parses a `K`/`V`/`END` record stream back into a property table.
///
/// Rejects any token at a record boundary other than `K ` or `END` with
/// [`ErrorKind::MalformedFile`].
pub fn parse_props(bytes: &[u8]) -> Result<PropTable, RvcError> {
    let mut props = PropTable::new();
    let mut rest = bytes;
    loop {
        if rest.starts_with(b"END\n") {
            return Ok(props);
        }
        let name = read_record(&mut rest, b'K')?;
        let value = read_record(&mut rest, b'V')?;
        let name = String::from_utf8(name).map_err(|_| malformed("property name is not UTF-8"))?;
        props.insert(name, value);
    }
}

fn read_record(rest: &mut &[u8], tag: u8) -> Result<Vec<u8>, RvcError> {
    if rest.len() < 2 || rest[0] != tag || rest[1] != b' ' {
        return Err(malformed(&format!("expected '{}' record", tag as char)));
    }
    let after_tag = &rest[2..];
    let newline = after_tag
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| malformed("unterminated length line"))?;
    if newline > MAX_LINE_LEN {
        return Err(malformed("length line too long"));
    }
    let len_str = std::str::from_utf8(&after_tag[..newline])
        .map_err(|_| malformed("length is not UTF-8"))?;
    let len: usize = len_str.parse().map_err(|_| malformed("length is not a number"))?;
    let body_start = 2 + newline + 1;
    if rest.len() < body_start + len + 1 {
        return Err(malformed("record body runs past end of input"));
    }
    let body = rest[body_start..body_start + len].to_vec();
    if rest[body_start + len] != b'\n' {
        return Err(malformed("record body missing trailing newline"));
    }
    *rest = &rest[body_start + len + 1..];
    Ok(body)
}

fn malformed(detail: &str) -> RvcError {
    RvcError::tagged(ErrorKind::MalformedFile, format!("malformed property table: {detail}"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn roundtrip_empty_table() {
        let props = PropTable::new();
        let bytes = serialize_props(&props);
        assert_eq!(bytes, b"END\n");
        assert_eq!(parse_props(&bytes).unwrap(), props);
    }

    #[test]
    fn roundtrip_matches_the_documented_example() {
        let mut props = PropTable::new();
        props.insert("color".to_string(), b"red".to_vec());
        let bytes = serialize_props(&props);
        assert_eq!(bytes, b"K 5\ncolor\nV 3\nred\nEND\n");
        assert_eq!(parse_props(&bytes).unwrap(), props);
    }

    #[test]
    fn rejects_garbage_at_a_record_boundary() {
        let err = parse_props(b"X 1\na\nEND\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFile);
    }

    #[test]
    fn rejects_truncated_body() {
        let err = parse_props(b"K 5\ncol\nEND\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFile);
    }

    proptest! {
        #[test]
        fn roundtrip_holds_for_arbitrary_tables(
            entries in prop::collection::vec(
                ("[a-z]{1,8}", prop::collection::vec(any::<u8>(), 0..40)),
                0..6,
            )
        ) {
            let props: PropTable = entries.into_iter().collect();
            let bytes = serialize_props(&props);
            prop_assert_eq!(parse_props(&bytes).unwrap(), props);
        }
    }
}
