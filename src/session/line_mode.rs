//! Line-buffered fallback used when stdin is not a terminal.

use std::io::Write;

use crate::session::model::{CLEAR_TOKEN, EXIT_TOKEN, SUBMIT_TOKEN};

pub const FIRST_PROMPT: &str = "user> ";
pub const CONTINUATION_PROMPT: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Submitted(String),
    Exit,
}

/// Accumulates lines until one ends with the submit token.
#[derive(Debug, Default)]
pub struct LineCollector {
    lines: Vec<String>,
    continuing: bool,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prompt(&self) -> &'static str {
        if self.continuing {
            CONTINUATION_PROMPT
        } else {
            FIRST_PROMPT
        }
    }

    pub fn feed(&mut self, raw_line: &str) -> LineOutcome {
        self.continuing = false;
        let line = raw_line.trim();
        if line.is_empty() {
            return LineOutcome::Continue;
        }
        if line == EXIT_TOKEN && self.lines.is_empty() {
            return LineOutcome::Exit;
        }
        if let Some(prefix) = line.strip_suffix(SUBMIT_TOKEN) {
            let prefix = prefix.trim_end();
            if !prefix.is_empty() {
                self.lines.push(prefix.to_string());
            }
            return LineOutcome::Submitted(std::mem::take(&mut self.lines).join("\n"));
        }
        if line == CLEAR_TOKEN {
            self.lines.clear();
        } else {
            self.lines.push(line.to_string());
        }
        self.continuing = true;
        LineOutcome::Continue
    }
}

/// Splits a byte stream into lines, holding back an unterminated tail.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    pub(crate) fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

pub(crate) fn write_prompt(out: &mut dyn Write, prompt: &str) -> std::io::Result<()> {
    out.write_all(prompt.as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{LineCollector, LineOutcome, LineSplitter, CONTINUATION_PROMPT, FIRST_PROMPT};

    #[test]
    fn end_suffix_submits_collected_lines() {
        let mut collector = LineCollector::new();
        assert_eq!(collector.prompt(), FIRST_PROMPT);
        assert_eq!(collector.feed("first\n"), LineOutcome::Continue);
        assert_eq!(collector.prompt(), CONTINUATION_PROMPT);
        assert_eq!(
            collector.feed("  second END\r\n"),
            LineOutcome::Submitted("first\nsecond".to_string())
        );
    }

    #[test]
    fn blank_lines_are_skipped_and_reset_prompt() {
        let mut collector = LineCollector::new();
        collector.feed("one");
        assert_eq!(collector.feed("   "), LineOutcome::Continue);
        assert_eq!(collector.prompt(), FIRST_PROMPT);
        assert_eq!(collector.feed("END"), LineOutcome::Submitted("one".to_string()));
    }

    #[test]
    fn exit_only_counts_before_any_content() {
        let mut collector = LineCollector::new();
        assert_eq!(collector.feed("exit"), LineOutcome::Exit);

        let mut collector = LineCollector::new();
        collector.feed("please");
        assert_eq!(collector.feed("exit"), LineOutcome::Continue);
        assert_eq!(
            collector.feed("END"),
            LineOutcome::Submitted("please\nexit".to_string())
        );
    }

    #[test]
    fn clear_discards_lines() {
        let mut collector = LineCollector::new();
        collector.feed("draft");
        collector.feed("CLEAR");
        assert_eq!(collector.feed("final END"), LineOutcome::Submitted("final".to_string()));
    }

    #[test]
    fn splitter_holds_partial_lines() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"ab").is_empty());
        assert_eq!(splitter.push(b"c\nde\nf"), vec!["abc".to_string(), "de".to_string()]);
        assert_eq!(splitter.take_rest(), Some("f".to_string()));
        assert_eq!(splitter.take_rest(), None);
    }
}
