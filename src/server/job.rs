use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Opaque job token: 16 random lowercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub const LEN: usize = 16;

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token = (0..Self::LEN)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        JobId(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One spawn-to-termination lifecycle of an external command.
///
/// The record is created at spawn time and lives in the history store;
/// output is appended while the job occupies the running slot, and the end
/// time and exit status are stamped exactly once when the child is reaped.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub command: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Raw OS wait status, not the decoded exit code.
    pub exit_status: Option<i32>,
    pub output: Vec<u8>,
}

impl Job {
    pub fn new(id: JobId, command: Vec<String>) -> Self {
        Self {
            id,
            command,
            started_at: Utc::now(),
            finished_at: None,
            exit_status: None,
            output: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Human-readable metadata block served for `status <id>`.
    pub fn metadata(&self) -> String {
        let mut out = format!("Command: {}\n", quote_argv(&self.command));
        out.push_str(&format!("Start-Time: {}\n", format_time(&self.started_at)));
        if let (Some(end), Some(status)) = (&self.finished_at, self.exit_status) {
            out.push_str(&format!("End-Time: {}\n", format_time(end)));
            out.push_str(&format!("Exit-Code: {}\n", status));
        }
        out
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Quote an argv for display: each word double-quoted with `\n`, `\\` and
/// `"` escaped, words joined by single spaces.
pub fn quote_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|word| {
            let mut quoted = String::with_capacity(word.len() + 2);
            quoted.push('"');
            for ch in word.chars() {
                match ch {
                    '\n' => quoted.push_str("\\n"),
                    '\\' => quoted.push_str("\\\\"),
                    '"' => quoted.push_str("\\\""),
                    other => quoted.push(other),
                }
            }
            quoted.push('"');
            quoted
        })
        .collect::<Vec<_>>()
        .join(" ")
}
