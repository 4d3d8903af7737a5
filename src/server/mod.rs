//! The daemon's run-time machine.
//!
//! This module owns every piece of daemon state and funnels all activity
//! through one `tokio::select!` loop on the single-threaded runtime:
//!
//! 1. A ready listener accepts a connection and spawns its protocol task.
//! 2. A parsed request arrives on the command channel, is dispatched
//!    against the state, and answered over its oneshot.
//! 3. The running child's capture pipe is readable: output is appended to
//!    the job record.
//! 4. SIGCHLD fires: pending output is drained non-blockingly, then the
//!    child is reaped, stamping end time and raw exit status. The drain
//!    runs before the reap, so output is never abandoned to an early exit
//!    notification.
//!
//! Between awaits a handler runs to completion, so no two events ever
//! interleave their state changes. Connection tasks never touch this state;
//! they only exchange messages with the loop.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;

use chrono::Utc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

pub mod connection;
pub mod history;
pub mod job;
pub mod signal;
pub mod supervisor;

pub use history::HistoryStore;
pub use job::{Job, JobId};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::protocol::{Request, Response};
use job::quote_argv;
use signal::SigchldBridge;
use supervisor::RunningChild;

/// Read size for the output capture pipe.
const OUTPUT_READ_SIZE: usize = 4096;

/// How many parsed requests may queue up ahead of the loop.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// A parsed request plus the channel its response goes back on.
pub struct CommandEnvelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// One readiness event, as reported by the multiplexed wait.
enum LoopEvent {
    Accepted(io::Result<UnixStream>),
    Command(CommandEnvelope),
    ChildExited,
    Output(io::Result<usize>),
    ConnectionClosed,
}

/// The daemon: listener, signal bridge, history, the single running slot,
/// and the set of live connection tasks. Exclusively owned by the event
/// loop; nothing else reads or writes this state.
pub struct Server {
    config: ServerConfig,
    listener: UnixListener,
    sigchld: SigchldBridge,
    history: HistoryStore,
    running: Option<RunningChild>,
    commands_tx: mpsc::Sender<CommandEnvelope>,
    commands_rx: mpsc::Receiver<CommandEnvelope>,
    connections: JoinSet<()>,
}

impl Server {
    /// Bind the control socket and register the SIGCHLD bridge. Either
    /// failing is fatal for startup; a stale socket file left by a dead
    /// daemon is the one condition recovered from (removed, bind retried
    /// once).
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = bind_listener(&config.socket_path)?;
        let sigchld = SigchldBridge::new()?;
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        Ok(Self {
            history: HistoryStore::new(config.retain),
            config,
            listener,
            sigchld,
            running: None,
            commands_tx,
            commands_rx,
            connections: JoinSet::new(),
        })
    }

    /// Drive the daemon until the surrounding task is cancelled. There is
    /// no protocol-reachable way out of this loop.
    pub async fn run(mut self) {
        tracing::info!(
            path = %self.config.socket_path.display(),
            retain = self.config.retain,
            "Listening for control connections"
        );

        let mut buf = [0u8; OUTPUT_READ_SIZE];
        loop {
            match self.next_event(&mut buf).await {
                LoopEvent::Accepted(Ok(stream)) => self.accept(stream),
                LoopEvent::Accepted(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
                LoopEvent::Command(envelope) => self.dispatch(envelope),
                LoopEvent::Output(result) => self.handle_output(result, &buf),
                LoopEvent::ChildExited => self.handle_sigchld(&mut buf),
                LoopEvent::ConnectionClosed => {
                    tracing::info!(active = self.connections.len(), "Connection finished");
                }
            }
        }
    }

    /// The multiplexed wait. Polling is tokio's fair default, so a child
    /// that floods its output pipe cannot starve the other arms; the
    /// output-before-reap ordering is enforced in the SIGCHLD handler
    /// itself.
    async fn next_event(&mut self, buf: &mut [u8]) -> LoopEvent {
        let output_pending = self
            .running
            .as_ref()
            .is_some_and(|child| !child.output_done);

        tokio::select! {
            result = read_running_output(self.running.as_mut(), buf), if output_pending => {
                LoopEvent::Output(result)
            }

            Some(_) = self.sigchld.recv() => LoopEvent::ChildExited,

            Some(envelope) = self.commands_rx.recv() => LoopEvent::Command(envelope),

            result = self.listener.accept() => {
                LoopEvent::Accepted(result.map(|(stream, _addr)| stream))
            }

            Some(_) = self.connections.join_next() => LoopEvent::ConnectionClosed,
        }
    }

    fn accept(&mut self, stream: UnixStream) {
        self.connections
            .spawn(connection::serve_connection(stream, self.commands_tx.clone()));
        tracing::info!(active = self.connections.len(), "Connection received");
    }

    /// Answer one request. Expected failures carry their own status code;
    /// anything else has already been folded into `ServerError::Io` and
    /// becomes a 500 with the error text.
    fn dispatch(&mut self, envelope: CommandEnvelope) {
        let CommandEnvelope { request, reply } = envelope;
        let response = match self.handle(request) {
            Ok(response) => response,
            Err(e) => Response::new(e.status(), e.to_string()),
        };
        // The connection may already be gone; nothing to do about it here.
        let _ = reply.send(response);
    }

    fn handle(&mut self, request: Request) -> Result<Response, ServerError> {
        match request {
            Request::Run { argv } => self.handle_run(argv),
            Request::Kill { id } => self.handle_kill(&id),
            Request::Log { id, offset } => self.handle_log(&id, offset),
            Request::Status { id } => self.handle_status(id.as_deref()),
            Request::Recent => self.handle_recent(),
            Request::Unrecognized { command } => Ok(Response::new(
                404,
                format!("Unknown command: {command}"),
            )),
        }
    }

    fn handle_run(&mut self, argv: Vec<String>) -> Result<Response, ServerError> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }
        if argv.is_empty() {
            return Err(ServerError::Io(io::Error::other("empty command line")));
        }

        let id = JobId::generate();
        let child = RunningChild::spawn(id.clone(), &argv)?;
        tracing::info!(id = %id, command = %quote_argv(&argv), "Spawned process");

        self.history.record(Job::new(id.clone(), argv));
        self.running = Some(child);
        Ok(Response::new(200, "Spawned process").with_body(id.as_str()))
    }

    fn handle_kill(&mut self, id: &str) -> Result<Response, ServerError> {
        // Only the currently running job can be killed; stale ids of
        // finished jobs and unknown ids alike are "not running".
        let child = self
            .running
            .as_ref()
            .filter(|child| child.id.as_str() == id)
            .ok_or(ServerError::NotRunning)?;
        child.terminate()?;
        tracing::info!(id = %child.id, "Sent kill signal");
        Ok(Response::new(200, "Sent kill signal"))
    }

    fn handle_log(&self, id: &str, offset: u64) -> Result<Response, ServerError> {
        let job = self.history.get(id).ok_or(ServerError::UnknownJob)?;
        if job.output.is_empty() {
            return Ok(Response::new(204, "No log"));
        }
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(job.output.len());
        Ok(Response::new(200, "Log follows").with_body(job.output[start..].to_vec()))
    }

    fn handle_status(&self, id: Option<&str>) -> Result<Response, ServerError> {
        let Some(id) = id else {
            return Ok(match &self.running {
                Some(child) => {
                    Response::new(200, "Running process").with_body(child.id.as_str())
                }
                None => Response::new(200, "Ready"),
            });
        };

        let job = self.history.get(id).ok_or(ServerError::UnknownJob)?;
        let message = if job.is_finished() {
            "Finished"
        } else {
            "Still running"
        };
        Ok(Response::new(200, message).with_body(job.metadata()))
    }

    fn handle_recent(&self) -> Result<Response, ServerError> {
        if self.history.is_empty() {
            return Ok(Response::new(204, "No recent processes"));
        }
        let mut body = String::new();
        for id in self.history.ids() {
            body.push_str(id.as_str());
            body.push('\n');
        }
        Ok(Response::new(200, "Listing recent processes").with_body(body))
    }

    /// Async-read path: a chunk of output arrived while the loop was
    /// otherwise idle. EOF here usually means the child is gone, so a reap
    /// is attempted straight away.
    fn handle_output(&mut self, result: io::Result<usize>, buf: &[u8]) {
        match result {
            Ok(0) => {
                self.mark_output_done();
                self.try_reap();
            }
            Ok(n) => self.append_running_output(&buf[..n]),
            Err(e) => {
                tracing::warn!(error = %e, "Error reading process output");
                self.mark_output_done();
            }
        }
    }

    /// SIGCHLD path: drain whatever the capture pipe still holds, then
    /// collect the exit status. A wakeup with no running job (or one whose
    /// child has not actually exited) is ignored.
    fn handle_sigchld(&mut self, buf: &mut [u8]) {
        if self.running.is_none() {
            tracing::debug!("SIGCHLD with no running job");
            return;
        }
        self.drain_pending_output(buf);
        self.try_reap();
    }

    fn drain_pending_output(&mut self, buf: &mut [u8]) {
        loop {
            let result = match self.running.as_mut() {
                Some(child) if !child.output_done => child.try_read_output(buf),
                _ => return,
            };
            match result {
                Ok(Some(0)) => {
                    self.mark_output_done();
                    return;
                }
                Ok(Some(n)) => self.append_running_output(&buf[..n]),
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Error draining process output");
                    self.mark_output_done();
                    return;
                }
            }
        }
    }

    fn append_running_output(&mut self, bytes: &[u8]) {
        let Some(child) = self.running.as_ref() else {
            return;
        };
        let id = child.id.clone();
        self.history.append_output(&id, bytes);
        tracing::debug!(id = %id, bytes = bytes.len(), "Captured process output");
    }

    fn mark_output_done(&mut self) {
        if let Some(child) = self.running.as_mut() {
            child.output_done = true;
        }
    }

    /// Collect the child's status and move the job to its terminal state.
    /// Idempotence is structural: the running slot is empty afterwards, and
    /// every path checks the slot first.
    fn try_reap(&mut self) {
        let result = match self.running.as_mut() {
            Some(child) => child.try_wait(),
            None => return,
        };
        match result {
            Ok(Some(status)) => {
                if let Some(child) = self.running.take() {
                    let raw = status.into_raw();
                    tracing::info!(id = %child.id, status = raw, "Process terminated");
                    if let Some(job) = self.history.get_mut(child.id.as_str()) {
                        job.finished_at = Some(Utc::now());
                        job.exit_status = Some(raw);
                    }
                }
            }
            // Not actually exited; a later SIGCHLD or pipe EOF retries.
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to collect child status"),
        }
    }
}

/// Read from the running child's capture pipe, or park forever when the
/// slot is empty (the select arm is disabled then anyway).
async fn read_running_output(
    running: Option<&mut RunningChild>,
    buf: &mut [u8],
) -> io::Result<usize> {
    match running {
        Some(child) => child.read_output(buf).await,
        None => std::future::pending().await,
    }
}

/// Bind the listener, recovering from exactly one stale socket file. A
/// socket that still accepts connections belongs to a live daemon and is
/// left alone.
fn bind_listener(path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("daemon already listening at {}", path.display()),
                ));
            }
            tracing::warn!(path = %path.display(), "Removing stale socket file");
            std::fs::remove_file(path)?;
            UnixListener::bind(path)
        }
        Err(e) => Err(e),
    }
}
