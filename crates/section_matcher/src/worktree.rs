//! Git worktree relationships between two directories.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::MatcherError;

const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers whether two directories check out the same repository history.
pub trait WorktreeOracle: Send + Sync {
    fn related(&self, working_dir: &Path, project_dir: &Path) -> bool;
}

/// Oracle that never relates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWorktrees;

impl WorktreeOracle for NoWorktrees {
    fn related(&self, _working_dir: &Path, _project_dir: &Path) -> bool {
        false
    }
}

/// Oracle backed by the `git` command line.
///
/// Two directories are related when either is a registered worktree of the
/// other, when both share a main worktree, or when their `origin` remotes
/// normalize to the same URL.
#[derive(Debug, Clone)]
pub struct GitCliOracle {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GitCliOracle {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl GitCliOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn git(&self, dir: &Path, command: &'static str, args: &[&str]) -> Result<String, MatcherError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| MatcherError::io("spawning git", dir, err))?;

        // Drained concurrently so a large listing cannot fill the pipe and stall the child.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut output = String::new();
                stdout.read_to_string(&mut output).map(|_| output)
            })
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                join_reader(reader, dir).ok();
                return Err(MatcherError::GitTimeout {
                    command,
                    dir: dir.to_path_buf(),
                    timeout_ms: self.timeout.as_millis(),
                });
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                join_reader(reader, dir).ok();
                return Err(MatcherError::io("waiting for git", dir, err));
            }
        };

        let output = join_reader(reader, dir)?;
        if !status.success() {
            return Err(MatcherError::GitStatus {
                command,
                dir: dir.to_path_buf(),
                status,
            });
        }
        Ok(output)
    }

    /// Every worktree registered for the repository containing `dir`, main
    /// worktree first.
    pub fn worktrees(&self, dir: &Path) -> Result<Vec<PathBuf>, MatcherError> {
        let output = self.git(dir, "worktree list", &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&output))
    }

    pub fn origin_url(&self, dir: &Path) -> Result<String, MatcherError> {
        let output = self.git(dir, "remote get-url", &["remote", "get-url", "origin"])?;
        Ok(output.trim().to_string())
    }

    fn is_worktree_of(&self, target: &Path, main: &Path) -> bool {
        match self.worktrees(main) {
            Ok(worktrees) => worktrees.iter().any(|worktree| same_dir(worktree, target)),
            Err(err) => {
                debug!(dir = %main.display(), error = %err, "worktree listing unavailable");
                false
            }
        }
    }

    fn main_worktree(&self, dir: &Path) -> Option<PathBuf> {
        self.worktrees(dir).ok()?.into_iter().next()
    }

    fn share_main_worktree(&self, a: &Path, b: &Path) -> bool {
        match (self.main_worktree(a), self.main_worktree(b)) {
            (Some(main_a), Some(main_b)) => same_dir(&main_a, &main_b),
            _ => false,
        }
    }

    fn share_origin(&self, a: &Path, b: &Path) -> bool {
        match (self.origin_url(a), self.origin_url(b)) {
            (Ok(origin_a), Ok(origin_b)) => normalize_git_url(&origin_a) == normalize_git_url(&origin_b),
            _ => false,
        }
    }
}

impl WorktreeOracle for GitCliOracle {
    fn related(&self, working_dir: &Path, project_dir: &Path) -> bool {
        self.is_worktree_of(working_dir, project_dir)
            || self.is_worktree_of(project_dir, working_dir)
            || self.share_main_worktree(working_dir, project_dir)
            || self.share_origin(working_dir, project_dir)
    }
}

/// Extracts the `worktree <path>` records of `git worktree list --porcelain`.
#[must_use]
pub fn parse_worktree_list(porcelain: &str) -> Vec<PathBuf> {
    porcelain
        .lines()
        .filter_map(|line| line.strip_prefix("worktree "))
        .map(PathBuf::from)
        .collect()
}

/// Canonical comparison form of a remote URL: SSH shorthand rewritten to
/// https, `.git` and trailing slash dropped, lowercased.
#[must_use]
pub fn normalize_git_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if let Some(rest) = url.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            url = format!("https://{host}/{path}");
        }
    }
    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }
    if let Some(stripped) = url.strip_suffix('/') {
        url = stripped.to_string();
    }

    url.to_lowercase()
}

fn join_reader(
    reader: Option<JoinHandle<io::Result<String>>>,
    dir: &Path,
) -> Result<String, MatcherError> {
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    match reader.join() {
        Ok(result) => result.map_err(|err| MatcherError::io("reading git output", dir, err)),
        Err(_) => Err(MatcherError::io(
            "reading git output",
            dir,
            io::Error::other("output reader panicked"),
        )),
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    let resolve = |path: &Path| fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolve(a) == resolve(b)
}
