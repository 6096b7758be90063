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

//! [`CommandHandler`] backed by a live [`RevisionStore`] (C5).
//!
//! `RepoCommandHandler` genuinely implements the core commands that only
//! need read access to committed history plus, for `change-rev-prop`, a
//! single in-place metadata write. The commands whose semantics are a full
//! tree-editor call stream over the wire — `commit`, `update`, `switch`,
//! `status`, `diff` — have no encoding anywhere in this crate: the wire
//! protocol (§6) carries `TreeEditor` calls as a report/edit exchange, and
//! building that encoding is out of scope here. Those five commands answer
//! [`ErrorKind::UnsupportedFeature`] rather than pretending to work; local
//! working copies drive the same engine in-process instead (see the CLI's
//! command layer), which is the supported path for them.

use std::sync::Mutex;

use crate::config::AccessLevel as ConfigAccessLevel;
use crate::config::RepositoryConfig;
use crate::dp::wire::AccessLevel;
use crate::dp::wire::AuthMechanism;
use crate::dp::wire::Command;
use crate::dp::wire::CoreCommand;
use crate::dp::wire::Greeting;
use crate::dp::wire::ReportCommand;
use crate::dp::wire::WireValue;
use crate::error::ErrorKind;
use crate::error::RvcError;
use crate::repo_path::RepoPath;
use crate::rs::NodeKind;
use crate::rs::RevisionStore;
use crate::rs::Revision;

fn config_access_to_wire(level: ConfigAccessLevel) -> AccessLevel {
    match level {
        ConfigAccessLevel::None => AccessLevel::None,
        ConfigAccessLevel::Read => AccessLevel::Read,
        ConfigAccessLevel::Write => AccessLevel::Write,
    }
}

fn required_args(command: &Command, count: usize) -> Result<(), RvcError> {
    if command.args.len() < count {
        return Err(RvcError::tagged(ErrorKind::IncorrectParams, format!("{} requires {count} argument(s)", command.name)));
    }
    Ok(())
}

fn arg_revision(command: &Command, index: usize) -> Result<Revision, RvcError> {
    command
        .args
        .get(index)
        .and_then(WireValue::as_number)
        .map(|n| n as Revision)
        .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: expected a revision number at argument {index}", command.name)))
}

fn arg_path<'a>(command: &'a Command, index: usize) -> Result<&'a RepoPath, RvcError> {
    let bytes = command
        .args
        .get(index)
        .and_then(WireValue::as_string)
        .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: expected a path at argument {index}", command.name)))?;
    let text = std::str::from_utf8(bytes).map_err(|_| RvcError::tagged(ErrorKind::IncorrectParams, "path is not valid UTF-8"))?;
    RepoPath::from_internal_string(text).map_err(|_| RvcError::tagged(ErrorKind::IncorrectParams, format!("{text}: not a valid repository path")))
}

fn arg_string<'a>(command: &'a Command, index: usize) -> Result<&'a [u8], RvcError> {
    command
        .args
        .get(index)
        .and_then(WireValue::as_string)
        .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: expected a string at argument {index}", command.name)))
}

fn arg_word<'a>(command: &'a Command, index: usize) -> Result<&'a str, RvcError> {
    command
        .args
        .get(index)
        .and_then(WireValue::as_word)
        .ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: expected a word at argument {index}", command.name)))
}

fn node_kind_word(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "file",
        NodeKind::Directory => "dir",
        NodeKind::Symlink => "symlink",
    }
}

/// A [`CommandHandler`](crate::dp::server::CommandHandler) over a single
/// repository, guarded by a mutex so every command sees a consistent
/// snapshot of committed history without blocking concurrent reads from
/// other repositories on the same process.
pub struct RepoCommandHandler {
    store: Mutex<RevisionStore>,
    config: RepositoryConfig,
}

impl RepoCommandHandler {
    pub fn new(store: RevisionStore, config: RepositoryConfig) -> Self {
        Self { store: Mutex::new(store), config }
    }

    fn handle_get_latest_rev(&self) -> Result<Vec<WireValue>, RvcError> {
        let store = self.store.lock().unwrap();
        Ok(vec![WireValue::Number(store.youngest() as i64)])
    }

    /// Finds the youngest revision whose `rvc:date` revprop is at or before
    /// the requested instant, an RFC 3339 timestamp. Revision 0 (which has
    /// no `rvc:date`) is always a valid answer, so this never fails with
    /// `BadRevision` the way a plain index lookup into `revisions` would.
    fn handle_get_dated_rev(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 1)?;
        let requested = arg_string(command, 0)?;
        let requested = std::str::from_utf8(requested).map_err(|_| RvcError::tagged(ErrorKind::IncorrectParams, "date is not valid UTF-8"))?;
        let requested = chrono::DateTime::parse_from_rfc3339(requested)
            .map_err(|_| RvcError::tagged(ErrorKind::IncorrectParams, format!("{requested}: not an RFC 3339 timestamp")))?;

        let store = self.store.lock().unwrap();
        let mut answer: Revision = 0;
        for revision in 0..=store.youngest() {
            let revprops = store.revprops(revision)?;
            let Some(raw) = revprops.get("rvc:date") else {
                continue;
            };
            let Ok(text) = std::str::from_utf8(raw) else {
                continue;
            };
            let Ok(committed) = chrono::DateTime::parse_from_rfc3339(text) else {
                continue;
            };
            if committed <= requested {
                answer = revision;
            } else {
                break;
            }
        }
        Ok(vec![WireValue::Number(answer as i64)])
    }

    fn handle_rev_proplist(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 1)?;
        let revision = arg_revision(command, 0)?;
        let store = self.store.lock().unwrap();
        let revprops = store.revprops(revision)?;
        let items = revprops
            .iter()
            .map(|(name, value)| WireValue::List(vec![WireValue::word(name.clone()), WireValue::string(value.clone())]))
            .collect();
        Ok(vec![WireValue::List(items)])
    }

    fn handle_rev_prop(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let revision = arg_revision(command, 0)?;
        let name = arg_word(command, 1)?;
        let store = self.store.lock().unwrap();
        let revprops = store.revprops(revision)?;
        match revprops.get(name) {
            Some(value) => Ok(vec![WireValue::List(vec![WireValue::string(value.clone())])]),
            None => Ok(vec![WireValue::List(vec![])]),
        }
    }

    fn handle_change_rev_prop(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let revision = arg_revision(command, 0)?;
        let name = arg_word(command, 1)?;
        let value = command.args.get(2).and_then(WireValue::as_string).map(<[u8]>::to_vec);
        let mut store = self.store.lock().unwrap();
        store.set_revprop(revision, name, value)?;
        Ok(vec![])
    }

    fn handle_get_file(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let revision = arg_revision(command, 0)?;
        let path = arg_path(command, 1)?;
        let store = self.store.lock().unwrap();
        let node = store.node_at(revision, path)?;
        let contents = store.read_file(revision, path)?;
        let props = node
            .properties
            .iter()
            .map(|(name, value)| WireValue::List(vec![WireValue::word(name.clone()), WireValue::string(value.clone())]))
            .collect();
        Ok(vec![WireValue::string(contents), WireValue::List(props)])
    }

    fn handle_get_dir(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let revision = arg_revision(command, 0)?;
        let path = arg_path(command, 1)?;
        let store = self.store.lock().unwrap();
        let node = store.node_at(revision, path)?;
        let children = node.children().ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, format!("{}: not a directory", path.as_internal_file_string())))?;
        let entries = children
            .iter()
            .map(|(name, child)| WireValue::List(vec![WireValue::word(name.as_internal_str().to_string()), WireValue::word(node_kind_word(child.kind()))]))
            .collect();
        let props = node
            .properties
            .iter()
            .map(|(name, value)| WireValue::List(vec![WireValue::word(name.clone()), WireValue::string(value.clone())]))
            .collect();
        Ok(vec![WireValue::List(entries), WireValue::List(props)])
    }

    fn handle_check_path(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let revision = arg_revision(command, 0)?;
        let path = arg_path(command, 1)?;
        let store = self.store.lock().unwrap();
        let word = match store.node_at(revision, path) {
            Ok(node) => node_kind_word(node.kind()),
            Err(e) if e.kind() == ErrorKind::PathNotFound => "none",
            Err(e) => return Err(e),
        };
        Ok(vec![WireValue::word(word)])
    }

    /// Replays `rvc:log`/`rvc:author`/`rvc:date` plus any custom revprops
    /// for each revision in `[start, end]`, inclusive, oldest first if
    /// `start <= end`, else newest first — mirroring the direction the
    /// caller asked for rather than always normalizing to ascending.
    fn handle_log(&self, command: &Command) -> Result<Vec<WireValue>, RvcError> {
        required_args(command, 2)?;
        let start = arg_revision(command, 0)?;
        let end = arg_revision(command, 1)?;
        let store = self.store.lock().unwrap();
        let youngest = store.youngest();
        if start > youngest || end > youngest {
            return Err(RvcError::tagged(ErrorKind::BadRevision, format!("revision range {start}..={end} exceeds youngest revision {youngest}")));
        }

        let revisions: Box<dyn Iterator<Item = Revision>> = if start <= end {
            Box::new(start..=end)
        } else {
            Box::new((end..=start).rev())
        };

        let mut entries = Vec::new();
        for revision in revisions {
            let revprops = store.revprops(revision)?;
            let props = revprops
                .iter()
                .map(|(name, value)| WireValue::List(vec![WireValue::word(name.clone()), WireValue::string(value.clone())]))
                .collect();
            entries.push(WireValue::List(vec![WireValue::Number(revision as i64), WireValue::List(props)]));
        }
        Ok(vec![WireValue::List(entries)])
    }
}

impl super::server::CommandHandler for RepoCommandHandler {
    fn handle(&self, command: &Command, _access: AccessLevel) -> Result<Vec<WireValue>, RvcError> {
        if let Some(core) = CoreCommand::from_name(&command.name) {
            return match core {
                CoreCommand::GetLatestRev => self.handle_get_latest_rev(),
                CoreCommand::GetDatedRev => self.handle_get_dated_rev(command),
                CoreCommand::RevProplist => self.handle_rev_proplist(command),
                CoreCommand::RevProp => self.handle_rev_prop(command),
                CoreCommand::ChangeRevProp => self.handle_change_rev_prop(command),
                CoreCommand::GetFile => self.handle_get_file(command),
                CoreCommand::GetDir => self.handle_get_dir(command),
                CoreCommand::CheckPath => self.handle_check_path(command),
                CoreCommand::Log => self.handle_log(command),
                CoreCommand::Commit | CoreCommand::Update | CoreCommand::Switch | CoreCommand::Status | CoreCommand::Diff => {
                    Err(RvcError::tagged(ErrorKind::UnsupportedFeature, format!("{} is not carried over the wire by this server; connect over a local working copy instead", command.name)))
                }
            };
        }
        if ReportCommand::from_name(&command.name).is_some() {
            return Err(RvcError::tagged(ErrorKind::UnsupportedFeature, "report sub-commands are only meaningful to the report-driven commands this server does not implement"));
        }
        Err(RvcError::tagged(ErrorKind::UnsupportedFeature, format!("unknown command: {}", command.name)))
    }

    /// Only `ANONYMOUS` is genuinely supported: `EXTERNAL` needs a tunneled
    /// transport (a Unix-domain-socket peer credential, say) that nothing
    /// upstream of this handler currently threads through, and `CRAM-MD5`
    /// needs the server to hand the client a fresh per-connection nonce
    /// before this method is ever called — `authenticate` only receives the
    /// client's credentials, with no channel back to issue that challenge.
    /// Both answer `UnsupportedFeature` rather than silently granting or
    /// silently rejecting access.
    fn authenticate(&self, mechanism: AuthMechanism, _credentials: &[u8]) -> Result<AccessLevel, RvcError> {
        match mechanism {
            AuthMechanism::Anonymous => Ok(config_access_to_wire(self.config.anon_access)),
            AuthMechanism::External | AuthMechanism::CramMd5 => Err(RvcError::tagged(ErrorKind::UnsupportedFeature, format!("{} authentication is not implemented by this server", mechanism.name()))),
        }
    }

    fn required_access(&self, command_name: &str) -> AccessLevel {
        match command_name {
            "change-rev-prop" | "commit" => AccessLevel::Write,
            _ => AccessLevel::Read,
        }
    }

    fn greeting(&self) -> Greeting {
        Greeting {
            version: 2,
            capabilities: vec!["mergeinfo".to_string()],
            target_url: None,
        }
    }
}
