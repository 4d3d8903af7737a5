//! Single-slot command execution daemon.
//!
//! `runslot` runs **at most one** external command at a time on behalf of
//! its callers, keeps the combined stdout/stderr of the last few jobs, and
//! answers a small line-oriented protocol over a Unix domain socket:
//! `run`, `kill`, `log`, `status`, and `recent`.
//!
//! # Architecture
//!
//! - [`server::Server`]: the event loop owning all daemon state — one
//!   `tokio::select!` on a current-thread runtime multiplexing the
//!   listener, client requests, the running child's output pipe, and the
//!   SIGCHLD bridge.
//! - [`server::supervisor`]: spawns the child with stdout and stderr
//!   combined into one capture pipe, delivers SIGTERM, reaps the exit
//!   status.
//! - [`server::history`]: bounded FIFO of recent jobs; the oldest record
//!   (output included) is discarded when a new job would exceed capacity.
//! - [`protocol`]: NUL-separated request framing and the
//!   `"{status:03} {length} {message}"` response header.
//! - [`client::ControlClient`]: one request per connection, used by the
//!   CLI subcommands.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod shutdown;
