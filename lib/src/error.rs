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

//! The crate-wide error taxonomy.
//!
//! Every error that crosses a component boundary (object store, transaction
//! manager, working-copy engine, wire protocol) is an [`RvcError`]. Internal
//! causes (`io::Error`, parse errors, ...) are attached as the source so a
//! caller can still walk the chain, but callers should match on [`ErrorKind`]
//! rather than downcast.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::repo_path::RepoPathBuf;

/// The fixed taxonomy of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PathNotFound,
    AlreadyExists,
    OutOfDate,
    BadUrl,
    NotAuthorized,
    NoLockToken,
    LockOwnerMismatch,
    ForbiddenByServer,
    TreeConflict,
    PathNotFoundUnderVc,
    IllegalTarget,
    DuplicateCommitUrl,
    EntryMissingUrl,
    PropertyNameReserved,
    MalformedFile,
    ConnectionClosed,
    Io,
    Cancelled,
    UnsupportedFeature,
    IncorrectParams,
    BadRevision,
    UnrelatedResources,
    NoAuthFilePath,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PathNotFound => "path-not-found",
            Self::AlreadyExists => "already-exists",
            Self::OutOfDate => "out-of-date",
            Self::BadUrl => "bad-url",
            Self::NotAuthorized => "not-authorized",
            Self::NoLockToken => "no-lock-token",
            Self::LockOwnerMismatch => "lock-owner-mismatch",
            Self::ForbiddenByServer => "forbidden-by-server",
            Self::TreeConflict => "tree-conflict",
            Self::PathNotFoundUnderVc => "path-not-found-under-vc",
            Self::IllegalTarget => "illegal-target",
            Self::DuplicateCommitUrl => "duplicate-commit-url",
            Self::EntryMissingUrl => "entry-missing-url",
            Self::PropertyNameReserved => "property-name-reserved",
            Self::MalformedFile => "malformed-file",
            Self::ConnectionClosed => "connection-closed",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
            Self::UnsupportedFeature => "unsupported-feature",
            Self::IncorrectParams => "incorrect-params",
            Self::BadRevision => "bad-revision",
            Self::UnrelatedResources => "unrelated-resources",
            Self::NoAuthFilePath => "no-auth-file-path",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The crate-wide error type.
///
/// Most variants are "tagged": they carry an [`ErrorKind`], a message, and an
/// optional chained cause. A few carry structured payloads because call sites
/// need them (the offending path, the conflicting URL, ...).
#[derive(Debug, Error)]
pub enum RvcError {
    #[error("{path}: no such path")]
    PathNotFound { path: RepoPathBuf },

    #[error("{path}: already exists")]
    AlreadyExists { path: RepoPathBuf },

    #[error("{path}: out of date")]
    OutOfDate { path: RepoPathBuf },

    #[error("{url}: not a valid URL")]
    BadUrl { url: String },

    #[error("{path}: not authorized")]
    NotAuthorized { path: RepoPathBuf },

    #[error("{path}: no lock token")]
    NoLockToken { path: RepoPathBuf },

    #[error("{url}: two commit items have the same URL")]
    DuplicateCommitUrl { url: String },

    #[error("'{name}' is a reserved property name")]
    PropertyNameReserved { name: String },

    #[error("malformed file: {detail}")]
    MalformedFile { detail: String },

    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Tagged {
        kind: ErrorKind,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl RvcError {
    /// The taxonomy kind of this error, independent of its Rust-level shape.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathNotFound { .. } => ErrorKind::PathNotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::OutOfDate { .. } => ErrorKind::OutOfDate,
            Self::BadUrl { .. } => ErrorKind::BadUrl,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::NoLockToken { .. } => ErrorKind::NoLockToken,
            Self::DuplicateCommitUrl { .. } => ErrorKind::DuplicateCommitUrl,
            Self::PropertyNameReserved { .. } => ErrorKind::PropertyNameReserved,
            Self::MalformedFile { .. } => ErrorKind::MalformedFile,
            Self::Io { .. } => ErrorKind::Io,
            Self::Tagged { kind, .. } => *kind,
        }
    }

    /// Builds a [`Tagged`](Self::Tagged) error with no underlying cause.
    pub fn tagged(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Tagged {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`Tagged`](Self::Tagged) error wrapping an underlying cause.
    pub fn tagged_with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Tagged {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn cancelled() -> Self {
        Self::tagged(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn connection_closed() -> Self {
        Self::tagged(ErrorKind::ConnectionClosed, "connection closed")
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RvcError>;
