//! Inline rendering of the session: prompt line, editable text, help line.
//!
//! The frame is redrawn in place below the cursor position where the session started;
//! the terminal's alternate screen is never used.

use std::time::{Duration, Instant};

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::session::model::SessionModel;

pub const PLACEHOLDER: &str = "Type your message here... (multi-line supported)";
pub const HELP_LINE: &str =
    "Type 'END'(Ctrl+S) to submit • Type 'CLEAR'(Ctrl+D) to reset • Type 'exit'(esc) to quit";

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// `user (2m 05s)> (client connected)`; the timer and caller parts are optional.
#[must_use]
pub fn render_user_prompt(
    show_timer: bool,
    show_callers: bool,
    remaining: Duration,
    callers: usize,
) -> String {
    let timer = if !show_timer {
        String::new()
    } else if remaining > Duration::ZERO {
        let secs = remaining.as_secs();
        format!(" ({}m {:02}s)", secs / 60, secs % 60)
    } else {
        " (0m0s)".to_string()
    };

    let callers = if !show_callers {
        String::new()
    } else {
        match callers {
            0 => " (staging)".to_string(),
            1 => " (client connected)".to_string(),
            n => format!(" ({n} clients connected)"),
        }
    };

    format!("user{timer}>{callers}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Allow the countdown when the model enables it.
    pub timer: bool,
    /// Show the waiting-caller status.
    pub callers: bool,
}

/// Screen rows of one render plus the cursor cell within them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
    pub cursor_row: usize,
    pub cursor_col: usize,
}

impl Frame {
    pub fn build(model: &SessionModel, options: ViewOptions, columns: u16, now: Instant) -> Self {
        let wrap = usize::from(columns).saturating_sub(1).max(1);
        let timer = model.timer();
        let mut lines = vec![render_user_prompt(
            options.timer && timer.is_visible(),
            options.callers,
            timer.remaining(now),
            model.callers(),
        )];

        let buffer = model.buffer();
        let (cursor_line, cursor_byte) = buffer.cursor();
        let mut cursor_row = lines.len();
        let mut cursor_col = 0;

        if buffer.is_empty() {
            lines.push(format!("{DIM}{PLACEHOLDER}{RESET}"));
        } else {
            for (index, line) in buffer.lines().iter().enumerate() {
                let (segments, cursor) = wrap_line(line, wrap, (index == cursor_line).then_some(cursor_byte));
                if let Some((row, col)) = cursor {
                    cursor_row = lines.len() + row;
                    cursor_col = col;
                }
                lines.extend(segments);
            }
        }

        lines.push(String::new());
        lines.push(format!("{DIM}{HELP_LINE}{RESET}"));

        Self {
            lines,
            cursor_row,
            cursor_col,
        }
    }
}

/// Splits `line` into rows of at most `width` cells and locates `cursor` (a byte offset).
fn wrap_line(line: &str, width: usize, cursor: Option<usize>) -> (Vec<String>, Option<(usize, usize)>) {
    let mut segments = vec![String::new()];
    let mut used = 0;
    let mut cursor_cell = None;

    for (index, grapheme) in line.grapheme_indices(true) {
        let cells = grapheme.width();
        if used + cells > width && used > 0 {
            segments.push(String::new());
            used = 0;
        }
        if cursor == Some(index) {
            cursor_cell = Some((segments.len() - 1, used));
        }
        if let Some(last) = segments.last_mut() {
            last.push_str(grapheme);
        }
        used += cells;
    }

    if cursor_cell.is_none() && cursor.is_some() {
        cursor_cell = Some((segments.len() - 1, used));
    }
    (segments, cursor_cell)
}

/// Tracks what was drawn last so the next frame can replace it.
#[derive(Debug, Default)]
pub struct InlineView {
    cursor_row: Option<usize>,
}

impl InlineView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escape sequence that replaces the previous frame with `frame`.
    pub fn redraw(&mut self, frame: &Frame) -> String {
        let mut out = self.rewind();
        out.push_str(&frame.lines.join("\r\n"));

        let last_row = frame.lines.len().saturating_sub(1);
        let up = last_row.saturating_sub(frame.cursor_row);
        if up > 0 {
            out.push_str(&format!("\x1b[{up}A"));
        }
        out.push('\r');
        if frame.cursor_col > 0 {
            out.push_str(&format!("\x1b[{}C", frame.cursor_col));
        }
        self.cursor_row = Some(frame.cursor_row);
        out
    }

    /// Draws `frame` a last time and leaves the cursor on a fresh line below it.
    pub fn finish(&mut self, frame: &Frame) -> String {
        let mut out = self.rewind();
        out.push_str(&frame.lines.join("\r\n"));
        out.push_str("\r\n");
        self.cursor_row = None;
        out
    }

    fn rewind(&self) -> String {
        match self.cursor_row {
            Some(0) => "\r\x1b[J".to_string(),
            Some(rows) => format!("\x1b[{rows}A\r\x1b[J"),
            None => String::new(),
        }
    }
}
