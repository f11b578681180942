use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while ingesting history from the git executable
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to start `{program}` in {}: {source}", .work_dir.display())]
    ProcessSpawn {
        program: String,
        work_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git exited with {}: {stderr}", exit_code_label(.code))]
    ProcessExit { code: Option<i32>, stderr: String },

    #[error("malformed commit hash: {text:?}")]
    MalformedHash { text: String },

    #[error("malformed log line ({reason}): {line:?}")]
    MalformedLogLine { line: String, reason: String },

    #[error("malformed ref line: {line:?}")]
    MalformedRefLine { line: String },

    #[error("query cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl LogError {
    pub(crate) fn malformed_line(line: &str, reason: impl Into<String>) -> Self {
        LogError::MalformedLogLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
