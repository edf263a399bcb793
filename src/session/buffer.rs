//! Multi-line text buffer with a grapheme-aware cursor.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Editable text as a list of lines. The cursor column is a byte offset that always
/// sits on a grapheme boundary of the current line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
    row: usize,
    col: usize,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
        }
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` with the cursor at the end.
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::default();
        buffer.insert_str(text);
        buffer
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `(row, byte column)` of the cursor.
    #[must_use]
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.newline();
            return;
        }
        self.lines[self.row].insert(self.col, ch);
        self.col += ch.len_utf8();
    }

    /// Inserts text at the cursor; `\r\n` and lone `\r` become line breaks.
    pub fn insert_str(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        for (index, segment) in normalized.split('\n').enumerate() {
            if index > 0 {
                self.newline();
            }
            self.lines[self.row].insert_str(self.col, segment);
            self.col += segment.len();
        }
    }

    pub fn newline(&mut self) {
        let tail = self.lines[self.row].split_off(self.col);
        self.row += 1;
        self.lines.insert(self.row, tail);
        self.col = 0;
    }

    /// Deletes the grapheme before the cursor, joining lines at column zero.
    pub fn backspace(&mut self) {
        if self.col > 0 {
            let start = self.prev_boundary();
            self.lines[self.row].replace_range(start..self.col, "");
            self.col = start;
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.lines[self.row].len();
            self.lines[self.row].push_str(&line);
        }
    }

    /// Deletes the grapheme under the cursor, joining the next line at end of line.
    pub fn delete(&mut self) {
        if self.col < self.lines[self.row].len() {
            let end = self.next_boundary();
            self.lines[self.row].replace_range(self.col..end, "");
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col = self.prev_boundary();
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.lines[self.row].len();
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.lines[self.row].len() {
            self.col = self.next_boundary();
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            let width = self.cursor_width();
            self.row -= 1;
            self.col = byte_at_width(&self.lines[self.row], width);
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            let width = self.cursor_width();
            self.row += 1;
            self.col = byte_at_width(&self.lines[self.row], width);
        }
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.lines[self.row].len();
    }

    /// Display width of the current line up to the cursor.
    #[must_use]
    pub fn cursor_width(&self) -> usize {
        self.lines[self.row][..self.col].width()
    }

    fn prev_boundary(&self) -> usize {
        let line = &self.lines[self.row][..self.col];
        line.grapheme_indices(true)
            .next_back()
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        let line = &self.lines[self.row];
        line[self.col..]
            .graphemes(true)
            .next()
            .map(|grapheme| self.col + grapheme.len())
            .unwrap_or(line.len())
    }
}

fn byte_at_width(line: &str, target: usize) -> usize {
    let mut width = 0;
    for (index, grapheme) in line.grapheme_indices(true) {
        let next = width + grapheme.width();
        if next > target {
            return index;
        }
        width = next;
    }
    line.len()
}
