use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config for {path}: {source}")]
    ConfigSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no user configuration directory is available on this platform")]
    NoConfigDir,

    #[error("profile '{name}' does not exist: {path}")]
    ProfileNotFound { name: String, path: PathBuf },

    #[error("profile '{name}' already exists: {path}")]
    ProfileExists { name: String, path: PathBuf },

    #[error("profile path is a directory, not a file: {path}")]
    ProfileIsDirectory { path: PathBuf },

    #[error("invalid profile name '{name}'")]
    InvalidName { name: String },

    #[error("requires non-empty content")]
    EmptyContent,
}

impl ProfileStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
