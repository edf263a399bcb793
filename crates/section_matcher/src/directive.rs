//! Parenthetical directives embedded in section headings.

use std::ops::Range;
use std::path::Path;

const CURSOR_ONLY: &str = "cursor-only";
const PROJECT_PREFIX: &str = "project:";

/// A `(project: <spec>)` group and where it sits in the heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirective<'a> {
    pub spec: &'a str,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives<'a> {
    pub cursor_only: bool,
    pub project: Option<ProjectDirective<'a>>,
}

/// Scans every closed `(...)` group of a heading from left to right.
///
/// The first `project:` group wins. A `(` with no closing `)` ends the scan.
pub fn scan_directives(heading: &str) -> Directives<'_> {
    let mut directives = Directives::default();
    let mut cursor = 0;

    while let Some(open) = heading[cursor..].find('(').map(|offset| cursor + offset) {
        let Some(close) = heading[open..].find(')').map(|offset| open + offset) else {
            break;
        };
        let inner = heading[open + 1..close].trim();

        if inner
            .split(',')
            .any(|part| part.trim() == CURSOR_ONLY)
        {
            directives.cursor_only = true;
        }

        if directives.project.is_none() {
            if let Some(spec) = inner.strip_prefix(PROJECT_PREFIX) {
                directives.project = Some(ProjectDirective {
                    spec: spec.trim(),
                    span: open..close + 1,
                });
            }
        }

        cursor = close + 1;
    }

    directives
}

/// Rewrites the heading's project group to name `dir`. Headings without a
/// project group come back unchanged.
pub fn replace_project_path(heading: &str, dir: &Path) -> String {
    let Some(project) = scan_directives(heading).project else {
        return heading.to_string();
    };
    format!(
        "{}({PROJECT_PREFIX} {}){}",
        &heading[..project.span.start],
        dir.display(),
        &heading[project.span.end..]
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{replace_project_path, scan_directives};

    #[test]
    fn finds_project_spec_with_surrounding_whitespace() {
        let directives = scan_directives("# Build (project:   ~/src/app  )");
        let project = directives.project.expect("project directive");
        assert_eq!(project.spec, "~/src/app");
        assert!(!directives.cursor_only);
    }

    #[test]
    fn cursor_only_and_project_coexist_in_any_order() {
        let directives = scan_directives("# Rules (cursor-only) (project: /work)");
        assert!(directives.cursor_only);
        assert_eq!(directives.project.map(|p| p.spec), Some("/work"));

        let directives = scan_directives("# Rules(project: /work)( cursor-only )");
        assert!(directives.cursor_only);
        assert_eq!(directives.project.map(|p| p.spec), Some("/work"));
    }

    #[test]
    fn first_project_group_wins() {
        let directives = scan_directives("# T (project: /a) (project: /b)");
        assert_eq!(directives.project.map(|p| p.spec), Some("/a"));
    }

    #[test]
    fn unclosed_group_is_not_a_directive() {
        let directives = scan_directives("# Broken (project: /a");
        assert!(directives.project.is_none());
    }

    #[test]
    fn plain_parentheses_are_ignored() {
        let directives = scan_directives("# Notes (draft) (v2)");
        assert_eq!(directives, Default::default());
    }

    #[test]
    fn cursor_only_must_be_a_whole_item() {
        let directives = scan_directives("# T (project: /tmp/cursor-only)");
        assert!(!directives.cursor_only);
        assert!(!scan_directives("# T (cursor-only rules)").cursor_only);
        assert!(scan_directives("# T (draft, cursor-only)").cursor_only);
    }

    #[test]
    fn replaces_only_the_project_group() {
        let heading = "## Deploy (cursor-only) (project: /old/path) tail";
        assert_eq!(
            replace_project_path(heading, Path::new("/new/dir")),
            "## Deploy (cursor-only) (project: /new/dir) tail"
        );
        assert_eq!(
            replace_project_path("# No spec", Path::new("/x")),
            "# No spec"
        );
    }
}
