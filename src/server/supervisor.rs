use std::io;
use std::os::fd::OwnedFd;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};

use crate::server::job::JobId;

/// The child occupying the single running slot.
///
/// Both stdout and stderr of the child are bound to the write end of one
/// anonymous pipe, so the captured output interleaves the two streams the
/// same way a terminal would. The parent's copies of the write end are
/// closed as soon as the child is spawned; end-of-file on the read end
/// therefore tracks the child (and anything it handed the fd to) going
/// away.
pub struct RunningChild {
    pub id: JobId,
    child: Child,
    output: pipe::Receiver,
    /// Set once the capture pipe has reported EOF.
    pub output_done: bool,
}

impl RunningChild {
    /// Start `argv` with stdin from the null device and combined output
    /// captured. The caller has already checked that the slot is free.
    pub fn spawn(id: JobId, argv: &[String]) -> io::Result<Self> {
        let (tx, rx) = pipe::pipe()?;
        let stdout: OwnedFd = tx.into_blocking_fd()?;
        let stderr = stdout.try_clone()?;

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;
        // The Command temporary drops here, closing the parent's write-end
        // fds; the pipe now EOFs when the child's copies close.

        Ok(Self {
            id,
            child,
            output: rx,
            output_done: false,
        })
    }

    /// Ask the child to terminate (SIGTERM). Best-effort: exit still
    /// arrives asynchronously through SIGCHLD, and a child that ignores
    /// the signal simply keeps running.
    pub fn terminate(&self) -> io::Result<()> {
        let pid = self
            .child
            .id()
            .ok_or_else(|| io::Error::other("child already reaped"))?;
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Await the next chunk of captured output. `Ok(0)` is EOF.
    pub async fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf).await
    }

    /// Non-blocking read used to drain the pipe after an exit notification.
    /// `Ok(None)` means nothing is pending right now; `Ok(Some(0))` is EOF.
    pub fn try_read_output(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.output.try_read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Collect the exit status if the child has terminated. Non-blocking;
    /// returns `Ok(None)` for a spurious wakeup.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}
