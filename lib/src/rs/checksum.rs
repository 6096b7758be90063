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

//! Strong and weak content checksums for object-store blobs.
//!
//! The object store returns both on every write: a strong, collision-resistant
//! digest (SHA-1-class) recorded on the node for integrity verification (the
//! wire protocol's `base-checksum` negotiation), and a weak, MD5-class digest
//! kept only for legacy wire compatibility checks.

use std::fmt;

use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;

/// A strong (SHA-1-class) checksum.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrongChecksum(Vec<u8>);

/// A weak (MD5-class) checksum.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeakChecksum(Vec<u8>);

macro_rules! checksum_impl {
    ($name:ident) => {
        impl $name {
            pub fn from_bytes(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn hex(&self) -> String {
                hex::encode(&self.0)
            }

            pub fn from_hex(hex: &str) -> Option<Self> {
                hex::decode(hex).ok().map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.hex())
            }
        }
    };
}

checksum_impl!(StrongChecksum);
checksum_impl!(WeakChecksum);

/// Both checksums computed from the same byte stream, as returned by
/// `put-stream`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checksums {
    pub strong: StrongChecksum,
    pub weak: WeakChecksum,
}

/// Computes both checksums of `data` in one pass.
pub fn checksum_bytes(data: &[u8]) -> Checksums {
    let mut strong_hasher = Sha1::new();
    strong_hasher.update(data);
    let mut weak_hasher = Md5::new();
    weak_hasher.update(data);
    Checksums {
        strong: StrongChecksum::from_bytes(strong_hasher.finalize().to_vec()),
        weak: WeakChecksum::from_bytes(weak_hasher.finalize().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_checksums() {
        let a = checksum_bytes(b"hello");
        let b = checksum_bytes(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_strong_checksum() {
        let a = checksum_bytes(b"hello");
        let b = checksum_bytes(b"world");
        assert_ne!(a.strong, b.strong);
    }

    #[test]
    fn hex_roundtrips() {
        let c = checksum_bytes(b"hello").strong;
        let decoded = StrongChecksum::from_hex(&c.hex()).unwrap();
        assert_eq!(c, decoded);
    }
}
