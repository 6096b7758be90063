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

//! The wire protocol (C6): the length-prefixed primitives, command/response
//! framing, and the auth mini-protocol that carry the delta protocol
//! between client and server.

use std::io::Read;
use std::io::Write;

use digest::Digest as _;
use md5::Md5;

use crate::error::ErrorKind;
use crate::error::RvcError;

/// One value in the wire grammar: *number*, *string*, *word*, or *list*.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireValue {
    Number(i64),
    String(Vec<u8>),
    Word(String),
    List(Vec<WireValue>),
}

impl WireValue {
    pub fn word(value: impl Into<String>) -> Self {
        WireValue::Word(value.into())
    }

    pub fn string(value: impl Into<Vec<u8>>) -> Self {
        WireValue::String(value.into())
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            WireValue::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            WireValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::List(items) => Some(items),
            _ => None,
        }
    }
}

fn malformed(detail: impl Into<String>) -> RvcError {
    RvcError::MalformedFile { detail: detail.into() }
}

/// Writes a single [`WireValue`] in wire form, recursing into lists.
pub fn write_value(out: &mut impl Write, value: &WireValue) -> Result<(), RvcError> {
    match value {
        WireValue::Number(n) => write!(out, "{n} ").map_err(|e| RvcError::io(std::path::PathBuf::new(), e)),
        WireValue::Word(w) => write!(out, "{w} ").map_err(|e| RvcError::io(std::path::PathBuf::new(), e)),
        WireValue::String(s) => {
            write!(out, "{}:", s.len()).map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
            out.write_all(s).map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
            write!(out, " ").map_err(|e| RvcError::io(std::path::PathBuf::new(), e))
        }
        WireValue::List(items) => {
            write!(out, "( ").map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
            for item in items {
                write_value(out, item)?;
            }
            write!(out, ") ").map_err(|e| RvcError::io(std::path::PathBuf::new(), e))
        }
    }
}

/// Encodes a [`WireValue`] into a fresh byte buffer.
pub fn encode(value: &WireValue) -> Result<Vec<u8>, RvcError> {
    let mut buf = Vec::new();
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// A cursor over an incoming byte stream, producing [`WireValue`]s one
/// token at a time. Holds no repository state; cancellation/connection-
/// closed handling lives in the server loop that owns the underlying
/// stream.
pub struct WireReader<R> {
    inner: R,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, RvcError> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) => Err(RvcError::io(std::path::PathBuf::new(), e)),
        }
    }

    fn require_byte(&mut self) -> Result<u8, RvcError> {
        self.read_byte()?.ok_or_else(crate::error::RvcError::connection_closed)
    }

    fn skip_one_space(&mut self) -> Result<(), RvcError> {
        let b = self.require_byte()?;
        if b != b' ' {
            return Err(malformed("expected single space separator"));
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Result<u8, RvcError> {
        loop {
            let b = self.require_byte()?;
            if b != b' ' && b != b'\n' && b != b'\r' {
                return Ok(b);
            }
        }
    }

    /// Reads the next complete [`WireValue`] from the stream.
    pub fn read_value(&mut self) -> Result<WireValue, RvcError> {
        let first = self.skip_whitespace()?;
        self.read_value_starting_with(first)
    }

    fn read_value_starting_with(&mut self, first: u8) -> Result<WireValue, RvcError> {
        match first {
            b'(' => {
                self.skip_one_space()?;
                let mut items = Vec::new();
                loop {
                    let peeked = self.skip_whitespace()?;
                    if peeked == b')' {
                        self.skip_one_space()?;
                        return Ok(WireValue::List(items));
                    }
                    items.push(self.read_value_starting_with(peeked)?);
                }
            }
            b'0'..=b'9' => {
                let mut digits = vec![first];
                let terminator = self.read_digits(&mut digits)?;
                let text = std::str::from_utf8(&digits).map_err(|_| malformed("non-utf8 digit run"))?;
                if terminator == b':' {
                    let len: usize = text.parse().map_err(|_| malformed("bad string length"))?;
                    let mut bytes = vec![0u8; len];
                    self.inner.read_exact(&mut bytes).map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
                    self.skip_one_space()?;
                    Ok(WireValue::String(bytes))
                } else if terminator == b' ' {
                    let n: i64 = text.parse().map_err(|_| malformed("bad number"))?;
                    Ok(WireValue::Number(n))
                } else {
                    Err(malformed("number or string not properly terminated"))
                }
            }
            b'a'..=b'z' | b'A'..=b'Z' => {
                let mut letters = vec![first];
                loop {
                    let b = self.require_byte()?;
                    if b == b' ' {
                        break;
                    }
                    if !b.is_ascii_alphabetic() && b != b'-' {
                        return Err(malformed("word contains non-alphabetic byte"));
                    }
                    letters.push(b);
                }
                let word = String::from_utf8(letters).map_err(|_| malformed("non-utf8 word"))?;
                Ok(WireValue::Word(word))
            }
            _ => Err(malformed(format!("unexpected byte {first:#x} at token start"))),
        }
    }

    fn read_digits(&mut self, digits: &mut Vec<u8>) -> Result<u8, RvcError> {
        loop {
            let b = self.require_byte()?;
            if b.is_ascii_digit() {
                digits.push(b);
            } else {
                return Ok(b);
            }
        }
    }
}

/// A parsed command: the leading word plus its argument list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<WireValue>,
}

impl Command {
    /// Every command on the wire is a list whose first element is a word.
    pub fn from_value(value: WireValue) -> Result<Self, RvcError> {
        let WireValue::List(mut items) = value else {
            return Err(malformed("command is not a list"));
        };
        if items.is_empty() {
            return Err(malformed("empty command list"));
        }
        let name = match items.remove(0) {
            WireValue::Word(w) => w,
            _ => return Err(malformed("command list does not start with a word")),
        };
        Ok(Command { name, args: items })
    }
}

/// The fixed set of core commands (§6). Report sub-commands are dispatched
/// separately by [`ReportCommand`] once a report is in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreCommand {
    GetLatestRev,
    GetDatedRev,
    RevProplist,
    RevProp,
    ChangeRevProp,
    GetFile,
    GetDir,
    Commit,
    Update,
    Switch,
    Status,
    Diff,
    Log,
    CheckPath,
}

impl CoreCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "get-latest-rev" => Self::GetLatestRev,
            "get-dated-rev" => Self::GetDatedRev,
            "rev-proplist" => Self::RevProplist,
            "rev-prop" => Self::RevProp,
            "change-rev-prop" => Self::ChangeRevProp,
            "get-file" => Self::GetFile,
            "get-dir" => Self::GetDir,
            "commit" => Self::Commit,
            "update" => Self::Update,
            "switch" => Self::Switch,
            "status" => Self::Status,
            "diff" => Self::Diff,
            "log" => Self::Log,
            "check-path" => Self::CheckPath,
            _ => return None,
        })
    }
}

/// Report sub-commands, sent while a report is being assembled (§4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportCommand {
    SetPath,
    LinkPath,
    DeletePath,
    FinishReport,
    AbortReport,
}

impl ReportCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "set-path" => Self::SetPath,
            "link-path" => Self::LinkPath,
            "delete-path" => Self::DeletePath,
            "finish-report" => Self::FinishReport,
            "abort-report" => Self::AbortReport,
            _ => return None,
        })
    }
}

/// Builds a `( success ( ... ) )` response.
pub fn success_response(items: Vec<WireValue>) -> WireValue {
    WireValue::List(vec![WireValue::word("success"), WireValue::List(items)])
}

/// One `( apr-err msg file line )` error tuple, mirroring the failure list
/// element shape from §6.
pub fn error_tuple(err: &RvcError) -> WireValue {
    WireValue::List(vec![
        WireValue::word(err.kind().to_string()),
        WireValue::string(err.to_string().into_bytes()),
        WireValue::string(Vec::new()),
        WireValue::Number(0),
    ])
}

/// Builds a `( failure ( ( apr-err msg file line ) ... ) )` response.
pub fn failure_response(errors: &[RvcError]) -> WireValue {
    WireValue::List(vec![
        WireValue::word("failure"),
        WireValue::List(errors.iter().map(error_tuple).collect()),
    ])
}

/// The version/capability greeting each side sends at connection start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Greeting {
    pub version: i64,
    pub capabilities: Vec<String>,
    pub target_url: Option<String>,
}

impl Greeting {
    pub fn to_wire(&self) -> WireValue {
        let mut items = vec![
            WireValue::Number(self.version),
            WireValue::List(self.capabilities.iter().map(|c| WireValue::word(c.clone())).collect()),
        ];
        if let Some(url) = &self.target_url {
            items.push(WireValue::string(url.clone().into_bytes()));
        }
        WireValue::List(items)
    }
}

/// Auth mechanisms (§6): `ANONYMOUS` needs no credentials, `EXTERNAL` is
/// uid-based and only valid on a tunneled transport, `CRAM-MD5` is a
/// challenge/response scheme checked against a password file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMechanism {
    Anonymous,
    External,
    CramMd5,
}

impl AuthMechanism {
    pub fn name(self) -> &'static str {
        match self {
            Self::Anonymous => "ANONYMOUS",
            Self::External => "EXTERNAL",
            Self::CramMd5 => "CRAM-MD5",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ANONYMOUS" => Some(Self::Anonymous),
            "EXTERNAL" => Some(Self::External),
            "CRAM-MD5" => Some(Self::CramMd5),
            _ => None,
        }
    }
}

/// The access level a completed auth exchange grants, per the repository
/// config's `none`/`read`/`write` levels (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    None,
    Read,
    Write,
}

/// Computes a CRAM-MD5 response digest for `challenge` under `password`,
/// per the classic keyed-MD5 challenge/response construction.
pub fn cram_md5_response(username: &str, password: &[u8], challenge: &[u8]) -> String {
    let digest = hmac_md5(password, challenge);
    format!("{username} {}", hex::encode(digest))
}

fn hmac_md5(key: &[u8], message: &[u8]) -> [u8; 16] {
    const BLOCK_SIZE: usize = 64;
    let mut key_block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let hashed = Md5::digest(key);
        key_block[..hashed.len()].copy_from_slice(&hashed);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }
    let mut ipad = [0x36u8; BLOCK_SIZE];
    let mut opad = [0x5cu8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        ipad[i] ^= key_block[i];
        opad[i] ^= key_block[i];
    }
    let mut inner_hasher = Md5::new();
    inner_hasher.update(ipad);
    inner_hasher.update(message);
    let inner = inner_hasher.finalize();
    let mut outer_hasher = Md5::new();
    outer_hasher.update(opad);
    outer_hasher.update(inner);
    outer_hasher.finalize().into()
}
