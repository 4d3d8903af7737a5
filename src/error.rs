use thiserror::Error;

/// Failures raised while executing a recognized command.
///
/// The `Display` text of each variant is exactly what goes on the wire as
/// the response message, so variants are worded for the caller rather than
/// for a log file.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Process already running")]
    AlreadyRunning,

    #[error("Not running")]
    NotRunning,

    #[error("Process not known")]
    UnknownJob,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Wire status code for this failure. Busy and not-found conditions are
    /// expected control flow (403/404); anything else is an internal error
    /// (500).
    pub fn status(&self) -> u16 {
        match self {
            ServerError::AlreadyRunning => 403,
            ServerError::NotRunning | ServerError::UnknownJob => 404,
            ServerError::Io(_) => 500,
        }
    }
}

/// Malformed request lines: bad arity or an argument that does not parse.
/// Answered with a 500 carrying the error text; never reaches the event loop.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("run requires at least one argument")]
    MissingCommandLine,

    #[error("kill expects exactly one job id")]
    KillArity,

    #[error("log expects a job id and an optional offset")]
    LogArity,

    #[error("log offset is not a number: {0}")]
    InvalidOffset(String),

    #[error("status expects at most one job id")]
    StatusArity,

    #[error("recent takes no arguments")]
    RecentArity,
}

/// Client-side failures while talking to the daemon.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request field contains a reserved byte (NUL or newline)")]
    InvalidField,

    #[error("malformed response header: {0:?}")]
    MalformedHeader(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
