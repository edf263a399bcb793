//! Selects the parts of a markdown guideline document that apply to a
//! working directory.
//!
//! Headings may carry `(project: <spec>)` and `(cursor-only)` directives.
//! See [`SectionMatcher::filter`].

mod directive;
mod error;
mod matcher;
mod path;
mod pattern;
mod section;
mod worktree;

pub use directive::{replace_project_path, scan_directives, Directives, ProjectDirective};
pub use error::MatcherError;
pub use matcher::{
    filter_document, select_most_specific, MatchReason, RuntimeFlavor, SectionMatch,
    SectionMatcher, GLOB_SPECIFICITY_BASE,
};
pub use path::{clean_path, expand_env_with, expand_home, has_glob_meta};
pub use pattern::ProjectGlob;
pub use section::{parse_sections, render_sections, Section};
pub use worktree::{normalize_git_url, parse_worktree_list, GitCliOracle, NoWorktrees, WorktreeOracle};
