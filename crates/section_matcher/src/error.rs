use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} timed out after {timeout_ms}ms in {dir}")]
    GitTimeout {
        command: &'static str,
        dir: PathBuf,
        timeout_ms: u128,
    },

    #[error("git {command} exited with {status} in {dir}")]
    GitStatus {
        command: &'static str,
        dir: PathBuf,
        status: ExitStatus,
    },

    #[error("invalid project glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("unbalanced braces in project glob '{pattern}'")]
    UnbalancedBraces { pattern: String },
}

impl MatcherError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn glob(pattern: impl Into<String>, source: glob::PatternError) -> Self {
        Self::Glob {
            pattern: pattern.into(),
            source,
        }
    }
}
