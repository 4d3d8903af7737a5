use tokio::signal::unix::{signal, Signal, SignalKind};

/// Pollable surrogate for SIGCHLD.
///
/// tokio's signal driver performs the classic self-pipe dance: the handler
/// does a non-blocking one-byte write to a wakeup pipe, and the stream side
/// becomes ready. Deliveries that arrive before the stream is drained
/// coalesce, but at least one wakeup is always observed, which is all the
/// event loop needs to know that a reap may be due. The handler itself
/// never touches daemon state.
pub struct SigchldBridge {
    stream: Signal,
}

impl SigchldBridge {
    /// Register interest in SIGCHLD. Failure here is a startup error; the
    /// daemon cannot run without exit notifications.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            stream: signal(SignalKind::child())?,
        })
    }

    /// Complete when at least one SIGCHLD has been delivered since the last
    /// poll. Returns `None` only if the signal stream is torn down, which
    /// does not happen while the runtime lives.
    pub async fn recv(&mut self) -> Option<()> {
        self.stream.recv().await
    }
}
