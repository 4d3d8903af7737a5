use std::path::PathBuf;

/// Well-known socket location used when no `--socket` is given.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/.runslot.sock";

/// How many recent jobs the daemon retains, including the running one.
pub const DEFAULT_RETAIN: usize = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Filesystem path the control socket is bound at.
    pub socket_path: PathBuf,
    /// Number of recent jobs to retain; the oldest record (output included)
    /// is discarded when a new job would exceed this.
    pub retain: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            retain: DEFAULT_RETAIN,
        }
    }
}

impl ServerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn with_retain(mut self, retain: usize) -> Self {
        self.retain = retain;
        self
    }
}
