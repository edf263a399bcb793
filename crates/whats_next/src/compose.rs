//! Shapes collected follow-ups into the text handed back to the agent.

use std::fmt;
use std::path::Path;

use profile_store::guidelines::{default_guidelines, GENERAL};
use profile_store::ProfileStore;
use section_matcher::{RuntimeFlavor, SectionMatcher};

pub const THINKING_NOTICE: &str = "The user is thinking, please execute `whats_next` again.";

/// Read-only access to the active guideline document.
pub trait ProfileSource: Send + Sync {
    /// `None` when no profile is selected or it cannot be read.
    fn active_document(&self) -> Option<String>;
}

impl ProfileSource for ProfileStore {
    fn active_document(&self) -> Option<String> {
        self.active_profile().map(|profile| profile.document)
    }
}

/// No profile is ever active; replies fall back to the built-in guidelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfile;

impl ProfileSource for NoProfile {
    fn active_document(&self) -> Option<String> {
        None
    }
}

pub struct Composer {
    profiles: Box<dyn ProfileSource>,
    matcher: SectionMatcher,
    flavor: RuntimeFlavor,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("matcher", &self.matcher)
            .field("flavor", &self.flavor)
            .finish_non_exhaustive()
    }
}

impl Composer {
    pub fn new(profiles: impl ProfileSource + 'static) -> Self {
        Self {
            profiles: Box::new(profiles),
            matcher: SectionMatcher::new(),
            flavor: RuntimeFlavor::detect(),
        }
    }

    pub fn with_matcher(mut self, matcher: SectionMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_flavor(mut self, flavor: RuntimeFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// The reply for `question`, or the thinking notice when it is empty.
    ///
    /// The active profile is filtered for `working_dir`; without a directory it
    /// is attached unfiltered.
    pub fn compose(&self, question: &str, working_dir: Option<&Path>) -> String {
        if question.is_empty() {
            return thinking_text();
        }

        let mut out = wrap_question(question);
        match self.profiles.active_document() {
            Some(document) => {
                let document = match working_dir {
                    Some(dir) => self.matcher.filter(&document, dir, self.flavor),
                    None => document,
                };
                out.push_str(&document);
                out.push('\n');
            }
            None => out.push_str(&default_guidelines()),
        }
        out
    }
}

/// The question wrapper followed by the `----` separator line.
#[must_use]
pub fn wrap_question(question: &str) -> String {
    format!(
        "the user is asking: \n<question>\n{question}\n</question>\nplease think step by step and give your answer\n----\n"
    )
}

/// Filler sent when the operator has not typed anything in time.
#[must_use]
pub fn thinking_text() -> String {
    format!("{THINKING_NOTICE}\n\n{GENERAL}")
}

/// Rewrites backquoted `whats_next` mentions to the name the agent actually invoked.
#[must_use]
pub fn rewrite_program_name(text: &str, program_name: &str) -> String {
    if program_name.is_empty() || program_name == "whats_next" {
        return text.to_string();
    }
    text.replace("`whats_next`", &format!("`{program_name}`"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use profile_store::guidelines::{default_guidelines, GENERAL};
    use section_matcher::{NoWorktrees, RuntimeFlavor, SectionMatcher};

    use super::{rewrite_program_name, thinking_text, Composer, NoProfile, ProfileSource};

    struct FixedProfile(&'static str);

    impl ProfileSource for FixedProfile {
        fn active_document(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn composer(profiles: impl ProfileSource + 'static) -> Composer {
        Composer::new(profiles)
            .with_matcher(SectionMatcher::with_oracle(NoWorktrees).with_home("/home/op"))
            .with_flavor(RuntimeFlavor::Other)
    }

    #[test]
    fn empty_question_yields_thinking_notice() {
        let text = composer(NoProfile).compose("", None);
        assert_eq!(text, thinking_text());
        assert!(text.starts_with("The user is thinking, please execute `whats_next` again.\n\n"));
        assert!(text.ends_with(GENERAL));
    }

    #[test]
    fn without_profile_default_guidelines_follow_separator() {
        let text = composer(NoProfile).compose("add tests", Some(Path::new("/work")));
        let expected = format!(
            "the user is asking: \n<question>\nadd tests\n</question>\nplease think step by step and give your answer\n----\n{}",
            default_guidelines()
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn active_profile_is_filtered_by_working_dir() {
        let document = "# Always\nbe brief\n# Api (project: /work/api)\nuse axum\n# Web (project: /work/web)\nuse vite";
        let text = composer(FixedProfile(document)).compose("next", Some(Path::new("/work/api/src")));
        assert!(text.ends_with("----\n# Always\nbe brief\n# Api (project: /work/api)\nuse axum\n"));
        assert!(!text.contains("use vite"));
    }

    #[test]
    fn profile_without_working_dir_is_attached_verbatim() {
        let document = "# Web (project: /work/web)\nuse vite";
        let text = composer(FixedProfile(document)).compose("next", None);
        assert!(text.ends_with("----\n# Web (project: /work/web)\nuse vite\n"));
    }

    #[test]
    fn program_name_rewrite_only_touches_backquoted_mentions() {
        let text = "run `whats_next` again; whats_next is the tool";
        assert_eq!(
            rewrite_program_name(text, "wn"),
            "run `wn` again; whats_next is the tool"
        );
        assert_eq!(rewrite_program_name(text, ""), text);
    }
}
