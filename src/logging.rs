//! Raw output capture for debugging terminal rendering.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Appends terminal output to a file; the first failure disables it for the session.
#[derive(Debug)]
pub struct WriteLog {
    path: PathBuf,
    failed: bool,
}

impl WriteLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            failed: false,
        }
    }

    pub fn append(&mut self, data: &str) {
        if self.failed || data.is_empty() {
            return;
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(data.as_bytes()));
        if let Err(error) = result {
            warn!(path = %self.path.display(), %error, "disabling terminal write log");
            self.failed = true;
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::WriteLog;

    #[test]
    fn appends_across_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.log");
        let mut log = WriteLog::new(&path);
        log.append("a");
        log.append("");
        log.append("b");
        assert_eq!(fs::read_to_string(&path).expect("read"), "ab");
        assert!(!log.is_disabled());
    }

    #[test]
    fn failure_disables_the_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = WriteLog::new(dir.path().join("missing").join("out.log"));
        log.append("x");
        assert!(log.is_disabled());
    }
}
