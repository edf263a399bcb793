//! Path-separator aware globs for `project:` specs.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::error::MatcherError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled project glob. `{a,b}` alternatives are expanded up front into
/// one pattern each, since `glob` itself has no brace syntax.
#[derive(Debug, Clone)]
pub struct ProjectGlob {
    patterns: Vec<Pattern>,
}

impl ProjectGlob {
    pub fn compile(pattern: &str) -> Result<Self, MatcherError> {
        let patterns = expand_braces(pattern)?
            .iter()
            .map(|alternative| {
                Pattern::new(alternative).map_err(|source| MatcherError::glob(pattern, source))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS))
    }
}

fn unbalanced(pattern: &str) -> MatcherError {
    MatcherError::UnbalancedBraces {
        pattern: pattern.to_string(),
    }
}

fn expand_braces(pattern: &str) -> Result<Vec<String>, MatcherError> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(unbalanced(pattern));
        }
        return Ok(vec![pattern.to_string()]);
    };
    if pattern[..open].contains('}') {
        return Err(unbalanced(pattern));
    }

    let mut depth = 0usize;
    let mut close = None;
    let mut bounds = vec![open];
    for (offset, ch) in pattern[open..].char_indices() {
        let index = open + offset;
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(index),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| unbalanced(pattern))?;
    bounds.push(close);

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut expanded = Vec::new();
    for pair in bounds.windows(2) {
        let alternative = &pattern[pair[0] + 1..pair[1]];
        expanded.extend(expand_braces(&format!("{prefix}{alternative}{suffix}"))?);
    }
    Ok(expanded)
}
