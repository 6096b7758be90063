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

//! The server (C5): three coexisting connection-concurrency models over a
//! single, model-agnostic per-connection command loop. Model (c),
//! sequential, is the correctness reference; (a) and (b) must be
//! observationally equivalent to it for any single connection.

use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;

use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::dp::wire::AccessLevel;
use crate::dp::wire::AuthMechanism;
use crate::dp::wire::Command;
use crate::dp::wire::Greeting;
use crate::dp::wire::WireReader;
use crate::dp::wire::WireValue;
use crate::dp::wire::failure_response;
use crate::dp::wire::success_response;
use crate::dp::wire::write_value;
use crate::error::ErrorKind;
use crate::error::RvcError;

/// The server-side view of one command: parse it, run it against the
/// repository, and produce the payload for a `success` response. Errors
/// are translated into `failure` responses by the connection loop; a
/// handler never writes to the wire directly.
///
/// One handler instance is shared across every connection and (in the
/// thread-per-connection model) across threads, matching the spec's "the
/// only shared mutable state is the object store, accessed only through
/// transactions" rule.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, command: &Command, access: AccessLevel) -> Result<Vec<WireValue>, RvcError>;

    /// Authenticates a client presenting `mechanism`, returning the access
    /// level granted. Re-invoked whenever a command needs a higher level
    /// than the connection currently holds.
    fn authenticate(&self, mechanism: AuthMechanism, credentials: &[u8]) -> Result<AccessLevel, RvcError>;

    /// The minimum access level a given command requires.
    fn required_access(&self, command_name: &str) -> AccessLevel;

    fn greeting(&self) -> Greeting;
}

/// Runs the per-connection protocol loop to completion: greeting exchange,
/// then repeated command dispatch until the peer disconnects.
///
/// `connection-closed` unwinds the whole loop (fatal for the connection);
/// any other error is reported as a `failure` response and dispatch
/// continues, per §7's propagation policy.
#[instrument(skip_all)]
pub fn handle_connection(stream: &mut (impl Read + Write), handler: &dyn CommandHandler) -> Result<(), RvcError> {
    write_value(stream, &handler.greeting().to_wire())?;

    let _client_greeting = WireReader::new(&mut *stream).read_value()?;

    let mut access = AccessLevel::None;
    loop {
        // A fresh `WireReader` per read: it holds no state across calls
        // beyond the stream itself, and scoping the borrow to this match
        // lets the loop body also write to `stream` directly afterwards.
        let value = match WireReader::new(&mut *stream).read_value() {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::ConnectionClosed => return Ok(()),
            Err(e) => return Err(e),
        };
        let command = match Command::from_value(value) {
            Ok(command) => command,
            Err(e) => {
                write_value(stream, &failure_response(&[e]))?;
                continue;
            }
        };

        if command.name == "auth" {
            access = dispatch_auth(&command, handler, stream)?;
            continue;
        }

        let needed = handler.required_access(&command.name);
        if access < needed {
            let err = RvcError::tagged(ErrorKind::NotAuthorized, format!("{} requires more than the current access level", command.name));
            write_value(stream, &failure_response(&[err]))?;
            continue;
        }

        match handler.handle(&command, access) {
            Ok(items) => write_value(stream, &success_response(items))?,
            Err(e) if e.kind() == ErrorKind::ConnectionClosed => return Ok(()),
            Err(e) => write_value(stream, &failure_response(&[e]))?,
        }
    }
}

fn dispatch_auth(command: &Command, handler: &dyn CommandHandler, stream: &mut (impl Read + Write)) -> Result<AccessLevel, RvcError> {
    let mechanism_word = command.args.first().and_then(WireValue::as_word).ok_or_else(|| RvcError::tagged(ErrorKind::IncorrectParams, "auth command missing mechanism"))?;
    let mechanism = AuthMechanism::from_name(mechanism_word).ok_or_else(|| RvcError::tagged(ErrorKind::UnsupportedFeature, format!("unknown auth mechanism {mechanism_word}")))?;
    let credentials = command.args.get(1).and_then(WireValue::as_string).unwrap_or(&[]);
    match handler.authenticate(mechanism, credentials) {
        Ok(access) => {
            write_value(stream, &success_response(vec![WireValue::word("authenticated")]))?;
            Ok(access)
        }
        Err(e) => {
            write_value(stream, &failure_response(&[e]))?;
            Ok(AccessLevel::None)
        }
    }
}

/// Model (c): the correctness reference. Serves one connection at a time,
/// on the calling thread, never overlapping a second connection's commands
/// with the first's.
pub fn serve_sequential(listener: &TcpListener, handler: &dyn CommandHandler) -> Result<(), RvcError> {
    for stream in listener.incoming() {
        let mut stream = stream.map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
        if let Err(e) = handle_connection(&mut stream, handler) {
            warn!(error = %e, "connection ended with an error");
        }
    }
    Ok(())
}

/// A simple counting permit pool bounding the number of connections being
/// served concurrently. Plain `std::thread::spawn` plus this bound, rather
/// than a work-stealing pool, since connection handling is long-lived and
/// blocks on network I/O rather than performing short, uniform CPU work.
struct WorkerSlots {
    state: Mutex<usize>,
    available: Condvar,
    max: usize,
}

impl WorkerSlots {
    fn new(max: usize) -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(0), available: Condvar::new(), max })
    }

    fn acquire(self: &Arc<Self>) {
        let mut in_use = self.state.lock().unwrap();
        while *in_use >= self.max {
            in_use = self.available.wait(in_use).unwrap();
        }
        *in_use += 1;
    }

    fn release(self: &Arc<Self>) {
        let mut in_use = self.state.lock().unwrap();
        *in_use -= 1;
        self.available.notify_one();
    }
}

/// Model (b): one OS thread per connection, bounded by `max_workers`
/// concurrently-running threads. `handler` is shared across all of them;
/// it must not hold any mutable state outside the object store's own
/// transaction machinery.
pub fn serve_thread_per_connection(listener: &TcpListener, handler: Arc<dyn CommandHandler>, max_workers: usize) -> Result<(), RvcError> {
    let slots = WorkerSlots::new(max_workers.max(1));
    for stream in listener.incoming() {
        let mut stream = stream.map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
        let slots = Arc::clone(&slots);
        let handler = Arc::clone(&handler);
        slots.acquire();
        std::thread::spawn(move || {
            if let Err(e) = handle_connection(&mut stream, handler.as_ref()) {
                warn!(error = %e, "connection ended with an error");
            }
            slots.release();
        });
    }
    Ok(())
}

/// Model (a): one OS process per connection. The caller supplies `respawn`,
/// which must hand the accepted socket off to a freshly spawned process
/// (typically a re-exec of the current binary with the connection's file
/// descriptor inherited as its standard streams) and return immediately —
/// this process never calls [`handle_connection`] itself, so a
/// multi-threaded server never forks while other threads are live.
/// Finished children are reaped opportunistically on each iteration so the
/// process table doesn't accumulate zombies.
pub fn serve_process_per_connection(listener: &TcpListener, respawn: impl Fn(TcpStream) -> std::io::Result<std::process::Child>) -> Result<(), RvcError> {
    let mut children: Vec<std::process::Child> = Vec::new();
    for stream in listener.incoming() {
        let stream = stream.map_err(|e| RvcError::io(std::path::PathBuf::new(), e))?;
        match respawn(stream) {
            Ok(child) => children.push(child),
            Err(e) => warn!(error = %e, "failed to spawn a connection-handling process"),
        }
        children.retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_))));
    }
    for mut child in children {
        let _ = child.wait();
    }
    Ok(())
}

/// Which of the three §5 concurrency models a running server uses. Chosen
/// once at startup; never switched mid-run.
pub enum ConcurrencyModel {
    Sequential,
    ThreadPerConnection { max_workers: usize },
    ProcessPerConnection { respawn: Box<dyn Fn(TcpStream) -> std::io::Result<std::process::Child> + Send + Sync> },
}

/// Runs `listener` under `model` until it returns an error (accept loops
/// never return `Ok` on their own; a bound `TcpListener` only stops
/// accepting when dropped or on an I/O error).
pub fn serve(listener: TcpListener, model: ConcurrencyModel, handler: Arc<dyn CommandHandler>) -> Result<(), RvcError> {
    info!(local_addr = ?listener.local_addr().ok(), "server listening");
    match model {
        ConcurrencyModel::Sequential => serve_sequential(&listener, handler.as_ref()),
        ConcurrencyModel::ThreadPerConnection { max_workers } => serve_thread_per_connection(&listener, handler, max_workers),
        ConcurrencyModel::ProcessPerConnection { respawn } => serve_process_per_connection(&listener, respawn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::wire::WireReader;
    use std::io::Cursor;

    struct EchoHandler;

    impl CommandHandler for EchoHandler {
        fn handle(&self, command: &Command, _access: AccessLevel) -> Result<Vec<WireValue>, RvcError> {
            if command.name == "boom" {
                return Err(RvcError::tagged(ErrorKind::Unknown, "boom"));
            }
            Ok(vec![WireValue::word(command.name.clone())])
        }

        fn authenticate(&self, _mechanism: AuthMechanism, _credentials: &[u8]) -> Result<AccessLevel, RvcError> {
            Ok(AccessLevel::Write)
        }

        fn required_access(&self, _command_name: &str) -> AccessLevel {
            AccessLevel::None
        }

        fn greeting(&self) -> Greeting {
            Greeting { version: 2, capabilities: vec!["mergeinfo".to_string()], target_url: None }
        }
    }

    struct DuplexBuffer {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for DuplexBuffer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for DuplexBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn encoded_commands(commands: &[WireValue]) -> Vec<u8> {
        let mut bytes = crate::dp::wire::encode(&Greeting { version: 2, capabilities: vec![], target_url: None }.to_wire()).unwrap();
        for command in commands {
            bytes.extend(crate::dp::wire::encode(command).unwrap());
        }
        bytes
    }

    #[test]
    fn an_unknown_command_yields_a_failure_without_ending_the_connection() {
        let commands = vec![
            WireValue::List(vec![WireValue::word("boom")]),
            WireValue::List(vec![WireValue::word("get-latest-rev")]),
        ];
        let mut duplex = DuplexBuffer { input: Cursor::new(encoded_commands(&commands)), output: Vec::new() };
        handle_connection(&mut duplex, &EchoHandler).unwrap();

        let mut reader = WireReader::new(Cursor::new(duplex.output));
        let _greeting = reader.read_value().unwrap();
        let first = reader.read_value().unwrap();
        assert_eq!(first.as_list().unwrap()[0].as_word(), Some("failure"));
        let second = reader.read_value().unwrap();
        assert_eq!(second.as_list().unwrap()[0].as_word(), Some("success"));
    }

    #[test]
    fn a_truncated_connection_ends_the_loop_cleanly() {
        let mut bytes = crate::dp::wire::encode(&Greeting { version: 2, capabilities: vec![], target_url: None }.to_wire()).unwrap();
        bytes.extend_from_slice(b"(");
        let mut duplex = DuplexBuffer { input: Cursor::new(bytes), output: Vec::new() };
        handle_connection(&mut duplex, &EchoHandler).unwrap();
    }

    #[test]
    fn worker_slots_bound_concurrent_acquisitions() {
        let slots = WorkerSlots::new(1);
        slots.acquire();
        let slots2 = Arc::clone(&slots);
        let handle = std::thread::spawn(move || {
            slots2.acquire();
            slots2.release();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!handle.is_finished());
        slots.release();
        handle.join().unwrap();
    }
}
