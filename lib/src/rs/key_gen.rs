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

//! Manufacturing sequential object-store keys.
//!
//! Keys are short, lexicographically-ordered base-36 strings. `next_key`
//! increments the rightmost digit with carry, the same scheme a ripening
//! odometer uses, widening the string by one digit only when every position
//! carries out.

/// Computes the successor of `key`.
///
/// `key` must not have a leading zero unless it is exactly `"0"`; passing
/// such a string, or one containing a byte outside `[0-9a-z]`, yields `None`.
///
/// `"0"` is reserved for the empty key: its successor is `"1"`. `"9"`'s
/// successor is `"a"`. `"z"`'s successor is `"10"`, the same way `"zz"`'s
/// successor is `"100"`.
pub fn next_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let bytes = key.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    let mut next = bytes.to_vec();
    let mut carry = true;
    for byte in next.iter_mut().rev() {
        if !carry {
            break;
        }
        match *byte {
            b'0'..=b'9' | b'a'..=b'z' => {}
            _ => return None,
        }
        if *byte == b'z' {
            *byte = b'0';
        } else {
            carry = false;
            *byte = if *byte == b'9' { b'a' } else { *byte + 1 };
        }
    }
    if carry {
        next.insert(0, b'1');
    }
    // SAFETY: only ASCII digits/lowercase letters were ever written.
    Some(String::from_utf8(next).unwrap())
}

/// Parses a base-36 `[0-9a-z]` key into its integer value, for testing and
/// diagnostics. Returns `None` for inputs `next_key` would also reject plus
/// the always-valid `"0"`.
pub fn key_to_u128(key: &str) -> Option<u128> {
    if key.is_empty() {
        return None;
    }
    if key.len() > 1 && key.as_bytes()[0] == b'0' {
        return None;
    }
    let mut value: u128 = 0;
    for &byte in key.as_bytes() {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'z' => byte - b'a' + 10,
            _ => return None,
        };
        value = value.checked_mul(36)?.checked_add(u128::from(digit))?;
    }
    Some(value)
}

/// Parses a decimal `ASCII` size prefix, as used by length-prefixed wire and
/// property-table primitives. Returns `(value, bytes_consumed)`, rejecting
/// overflow past `max` and inputs with no digits.
pub fn getsize(data: &[u8], max: usize) -> Option<(usize, usize)> {
    let max_prefix = max / 10;
    let max_digit = max % 10;
    let mut value: usize = 0;
    let mut i = 0;
    while i < data.len() && data[i].is_ascii_digit() {
        let digit = usize::from(data[i] - b'0');
        if value > max_prefix || (value == max_prefix && digit > max_digit) {
            return None;
        }
        value = value * 10 + digit;
        i += 1;
    }
    if i == 0 { None } else { Some((value, i)) }
}
