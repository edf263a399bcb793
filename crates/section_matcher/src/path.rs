//! Resolution of `project:` specs into absolute, cleaned paths.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

const GLOB_META: [char; 6] = ['*', '?', '[', ']', '{', '}'];

#[must_use]
pub fn has_glob_meta(text: &str) -> bool {
    text.contains(GLOB_META)
}

/// Expands a leading `~/` against `home`. Other tildes are literal.
#[must_use]
pub fn expand_home(spec: &str, home: Option<&Path>) -> String {
    match (spec.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => spec.to_string(),
    }
}

fn env_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("env reference regex must compile")
    })
}

/// Replaces `$NAME` and `${NAME}` references. Unset variables expand to
/// the empty string.
pub fn expand_env_with<F>(spec: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    env_reference()
        .replace_all(spec, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

/// Lexically normalizes a path: drops `.`, folds `..` into its parent and
/// never climbs above the root.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Number of named components in a path. The root itself counts for nothing.
#[must_use]
pub fn segment_count(path: &Path) -> usize {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .count()
}

/// Segments of a glob path that carry no glob metacharacters.
#[must_use]
pub fn literal_segment_count(path: &Path) -> usize {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .filter(|name| !has_glob_meta(name))
        .count()
}

/// Expansion applied to a spec before it is anchored to a directory.
pub fn expand_spec<F>(spec: &str, home: Option<&Path>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    expand_env_with(&expand_home(spec, home), lookup)
}

/// Anchors an expanded spec to `working_dir` when relative, then cleans it.
#[must_use]
pub fn anchor(expanded: &str, working_dir: &Path) -> PathBuf {
    let candidate = Path::new(expanded);
    if candidate.is_absolute() {
        clean_path(candidate)
    } else {
        clean_path(&working_dir.join(candidate))
    }
}
