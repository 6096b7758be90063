// Copyright 2022 The Jujutsu Authors
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

//! Top-level CLI error type: wraps [`RvcError`] (and a few other causes)
//! with presentation concerns the library itself stays free of — an exit
//! code and an optional one-line hint printed below the error message.

use std::fmt;
use std::process::ExitCode;

use rvc_lib::error::ErrorKind;
use rvc_lib::error::RvcError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CommandErrorKind {
    /// The user asked for something that can't be done (bad args, a path
    /// that isn't under version control, a conflicting commit, ...).
    User,
    /// The CLI or repository configuration is invalid or unreadable.
    Config,
    /// An I/O failure unrelated to user input (disk full, permission
    /// denied, broken pipe to a pager, ...).
    Io,
    /// A bug: an invariant the code assumes should never be violated was.
    Internal,
}

impl CommandErrorKind {
    fn exit_code(self) -> u8 {
        match self {
            Self::User => 1,
            Self::Config | Self::Io => 2,
            Self::Internal => 255,
        }
    }
}

#[derive(Debug)]
pub struct CommandError {
    kind: CommandErrorKind,
    message: String,
    hint: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CommandError {
    pub fn new(kind: CommandErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            source: None,
        }
    }

    pub fn with_source(
        kind: CommandErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::User, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Internal, message)
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.kind.exit_code())
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<RvcError> for CommandError {
    fn from(err: RvcError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Io => CommandErrorKind::Io,
            ErrorKind::Unknown => CommandErrorKind::Internal,
            _ => CommandErrorKind::User,
        };
        Self {
            kind,
            message: err.to_string(),
            hint: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(CommandErrorKind::Io, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_kind() {
        assert_eq!(CommandError::user("x").exit_code(), ExitCode::from(1));
        assert_eq!(CommandError::config("x").exit_code(), ExitCode::from(2));
        assert_eq!(CommandError::internal("x").exit_code(), ExitCode::from(255));
    }

    #[test]
    fn hint_is_attached_and_retrievable() {
        let err = CommandError::user("bad path").with_hint("did you mean `status`?");
        assert_eq!(err.hint(), Some("did you mean `status`?"));
    }

    #[test]
    fn rvc_error_kind_maps_to_command_error_kind() {
        let io_err = RvcError::io("/tmp/x", std::io::Error::other("boom"));
        let cmd_err: CommandError = io_err.into();
        assert_eq!(cmd_err.kind(), CommandErrorKind::Io);

        let out_of_date = RvcError::tagged(ErrorKind::OutOfDate, "stale");
        let cmd_err: CommandError = out_of_date.into();
        assert_eq!(cmd_err.kind(), CommandErrorKind::User);
    }
}
