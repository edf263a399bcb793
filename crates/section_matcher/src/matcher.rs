//! Project-aware filtering of guideline documents.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::directive::{replace_project_path, scan_directives};
use crate::path::{anchor, clean_path, expand_spec, has_glob_meta, literal_segment_count, segment_count};
use crate::pattern::ProjectGlob;
use crate::section::{parse_sections, render_sections, Section};
use crate::worktree::{GitCliOracle, WorktreeOracle};

/// Glob matches rank above every literal match so the literal specificity
/// comparison can never suppress them.
pub const GLOB_SPECIFICITY_BASE: usize = 1000;

/// Whether the agent runtime reading the guidelines is cursor-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFlavor {
    CursorLike,
    Other,
}

impl RuntimeFlavor {
    /// Reads `CLAUDECODE`: `1` or `true` marks a non-cursor runtime.
    pub fn detect() -> Self {
        Self::from_env_value(env::var("CLAUDECODE").ok().as_deref())
    }

    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("1") | Some("true") => Self::Other,
            _ => Self::CursorLike,
        }
    }

    #[must_use]
    pub fn is_cursor_like(self) -> bool {
        self == Self::CursorLike
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    NoProjectSpec,
    LiteralPathMatch,
    GlobMatch,
    GitWorktreeMatch,
}

impl MatchReason {
    fn competes_on_specificity(self) -> bool {
        matches!(self, Self::LiteralPathMatch | Self::GitWorktreeMatch)
    }
}

/// A section that survived the per-section checks of one filtering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMatch {
    pub section: Section,
    pub reason: MatchReason,
    pub resolved_project_path: Option<PathBuf>,
    pub specificity: usize,
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

pub struct SectionMatcher {
    oracle: Box<dyn WorktreeOracle>,
    home: Option<PathBuf>,
    env_lookup: Box<EnvLookup>,
}

impl fmt::Debug for SectionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionMatcher")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

impl Default for SectionMatcher {
    fn default() -> Self {
        Self::with_oracle(GitCliOracle::new())
    }
}

impl SectionMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(oracle: impl WorktreeOracle + 'static) -> Self {
        Self {
            oracle: Box::new(oracle),
            home: dirs::home_dir(),
            env_lookup: Box::new(|name| env::var(name).ok()),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Decides whether one section applies to `working_dir`.
    pub fn evaluate(
        &self,
        section: &Section,
        working_dir: &Path,
        flavor: RuntimeFlavor,
    ) -> Option<SectionMatch> {
        let directives = scan_directives(&section.title);
        if directives.cursor_only && !flavor.is_cursor_like() {
            return None;
        }

        let unconditional = || SectionMatch {
            section: section.clone(),
            reason: MatchReason::NoProjectSpec,
            resolved_project_path: None,
            specificity: 0,
        };
        let Some(project) = directives.project else {
            return Some(unconditional());
        };

        let working_dir = absolute(working_dir);
        let expanded = expand_spec(project.spec, self.home.as_deref(), &*self.env_lookup);
        let resolved = anchor(&expanded, &working_dir);
        let matched = |reason, specificity| SectionMatch {
            section: section.clone(),
            reason,
            resolved_project_path: Some(resolved.clone()),
            specificity,
        };

        if has_glob_meta(&expanded) {
            let pattern = resolved.to_string_lossy();
            return match ProjectGlob::compile(&pattern) {
                Ok(glob) if glob.matches(&working_dir) => Some(matched(
                    MatchReason::GlobMatch,
                    GLOB_SPECIFICITY_BASE + literal_segment_count(&resolved),
                )),
                Ok(_) => None,
                Err(err) => {
                    debug!(heading = %section.title, error = %err, "project glob ignored");
                    Some(unconditional())
                }
            };
        }

        if working_dir.starts_with(&resolved) {
            return Some(matched(
                MatchReason::LiteralPathMatch,
                segment_count(&resolved),
            ));
        }

        if self.oracle.related(&working_dir, &resolved) {
            // Ranked by the directory the heading will be rewritten to, so
            // filtering the output again selects the same sections.
            return Some(matched(
                MatchReason::GitWorktreeMatch,
                segment_count(&working_dir),
            ));
        }

        None
    }

    /// Filters `document` down to the sections that apply to `working_dir`.
    pub fn filter(&self, document: &str, working_dir: &Path, flavor: RuntimeFlavor) -> String {
        let working_dir = absolute(working_dir);
        let matches = parse_sections(document)
            .iter()
            .filter_map(|section| self.evaluate(section, &working_dir, flavor))
            .collect();

        let sections: Vec<Section> = select_most_specific(matches)
            .into_iter()
            .map(|matched| {
                let mut section = matched.section;
                if matched.reason == MatchReason::GitWorktreeMatch {
                    section.title = replace_project_path(&section.title, &working_dir);
                }
                section
            })
            .collect();

        render_sections(&sections)
    }
}

/// Keeps every unconditional and glob match, and only the most specific of
/// the literal project matches. Document order is preserved.
pub fn select_most_specific(matches: Vec<SectionMatch>) -> Vec<SectionMatch> {
    let best_literal = matches
        .iter()
        .filter(|matched| matched.reason.competes_on_specificity())
        .map(|matched| matched.specificity)
        .max();

    matches
        .into_iter()
        .filter(|matched| {
            !matched.reason.competes_on_specificity() || Some(matched.specificity) == best_literal
        })
        .collect()
}

/// Filters with the git-backed oracle and the process environment.
pub fn filter_document(document: &str, working_dir: &Path, flavor: RuntimeFlavor) -> String {
    SectionMatcher::new().filter(document, working_dir, flavor)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return clean_path(path);
    }
    match env::current_dir() {
        Ok(cwd) => clean_path(&cwd.join(path)),
        Err(_) => clean_path(path),
    }
}
