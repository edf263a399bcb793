//! Heading-delimited sections of a guideline document.

const FENCE_MARKER: &str = "```";

/// One heading line plus the body text that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Splits a document into sections.
///
/// A line starting with `#` opens a section unless it sits inside a fenced
/// code block. Text before the first heading belongs to no section and is
/// dropped.
pub fn parse_sections(document: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut in_fence = false;

    for line in document.split('\n') {
        if line.trim().starts_with(FENCE_MARKER) {
            in_fence = !in_fence;
        }

        if !in_fence && line.starts_with('#') {
            if let Some((title, body)) = current.take() {
                sections.push(Section::new(title, body.join("\n")));
            }
            current = Some((line.to_string(), Vec::new()));
            continue;
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((title, body)) = current {
        sections.push(Section::new(title, body.join("\n")));
    }

    sections
}

/// Joins sections back into a document, heading first, empty bodies omitted.
pub fn render_sections<'a>(sections: impl IntoIterator<Item = &'a Section>) -> String {
    let mut parts = Vec::new();
    for section in sections {
        parts.push(section.title.as_str());
        if !section.content.is_empty() {
            parts.push(section.content.as_str());
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{parse_sections, render_sections, Section};

    #[test]
    fn splits_on_headings_and_drops_preamble() {
        let doc = "intro text\n# First\nline a\nline b\n## Second\nline c";
        assert_eq!(
            parse_sections(doc),
            vec![
                Section::new("# First", "line a\nline b"),
                Section::new("## Second", "line c"),
            ]
        );
    }

    #[test]
    fn headings_inside_code_fences_stay_in_content() {
        let doc = "# Build\n```bash\n# not a heading\nmake\n```\n# Next\nbody";
        let sections = parse_sections(doc);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].content,
            "```bash\n# not a heading\nmake\n```"
        );
        assert_eq!(sections[1].title, "# Next");
    }

    #[test]
    fn indented_fence_markers_still_toggle() {
        let doc = "# A\n  ```\n# inside\n  ```\n# B";
        let sections = parse_sections(doc);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].title, "# B");
    }

    #[test]
    fn document_without_headings_has_no_sections() {
        assert!(parse_sections("just text\nmore text").is_empty());
        assert!(parse_sections("").is_empty());
    }

    #[test]
    fn blank_lines_inside_a_body_are_kept() {
        let doc = "# A\n\nfirst\n\nsecond\n# B";
        let sections = parse_sections(doc);
        assert_eq!(sections[0].content, "\nfirst\n\nsecond");
        assert_eq!(render_sections(&sections), doc);
    }

    #[test]
    fn render_omits_empty_bodies() {
        let sections = vec![Section::new("# A", ""), Section::new("# B", "body")];
        assert_eq!(render_sections(&sections), "# A\n# B\nbody");
    }
}
