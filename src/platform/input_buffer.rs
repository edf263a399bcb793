//! Splits raw terminal reads into key sequences and bracketed pastes.

use std::time::{Duration, Instant};

const ESC: u8 = 0x1b;
const PASTE_START: &str = "\x1b[200~";
const PASTE_END: &str = "\x1b[201~";

/// One unit of decoded terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputChunk {
    /// A single character or a complete escape sequence.
    Key(String),
    /// Text between bracketed-paste markers, markers removed.
    Paste(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Completeness {
    Complete,
    Incomplete,
}

/// Buffers partial escape sequences and UTF-8 tails across reads.
///
/// A lone `ESC` stays buffered until `escape_timeout` elapses so that a bare Escape
/// key can be told apart from the first byte of a longer sequence.
pub struct InputBuffer {
    pending_bytes: Vec<u8>,
    pending: String,
    escape_timeout: Duration,
    in_paste: bool,
    paste: String,
    flush_deadline: Option<Instant>,
}

impl InputBuffer {
    pub fn new(escape_timeout_ms: u64) -> Self {
        Self {
            pending_bytes: Vec::new(),
            pending: String::new(),
            escape_timeout: Duration::from_millis(escape_timeout_ms),
            in_paste: false,
            paste: String::new(),
            flush_deadline: None,
        }
    }

    pub fn process(&mut self, data: &[u8]) -> Vec<InputChunk> {
        self.process_at(data, Instant::now())
    }

    pub fn process_at(&mut self, data: &[u8], now: Instant) -> Vec<InputChunk> {
        self.flush_deadline = None;
        self.pending_bytes.extend_from_slice(data);
        let text = self.take_utf8();
        let mut chunks = Vec::new();
        self.push_text(&text, &mut chunks);
        if !self.pending.is_empty() {
            self.flush_deadline = Some(now + self.escape_timeout);
        }
        chunks
    }

    /// Emits a buffered incomplete sequence verbatim once its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<InputChunk> {
        match self.flush_deadline {
            Some(deadline) if now >= deadline && !self.pending.is_empty() => {
                self.flush_deadline = None;
                vec![InputChunk::Key(std::mem::take(&mut self.pending))]
            }
            Some(_) if self.pending.is_empty() => {
                self.flush_deadline = None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Poll timeout that wakes the reader in time for the next flush.
    pub fn next_timeout_ms(&self, now: Instant, default_ms: i32) -> i32 {
        match self.flush_deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(now).as_millis();
                (remaining.min(i32::MAX as u128) as i32).clamp(0, default_ms)
            }
            None => default_ms,
        }
    }

    pub fn clear(&mut self) {
        self.pending_bytes.clear();
        self.pending.clear();
        self.in_paste = false;
        self.paste.clear();
        self.flush_deadline = None;
    }

    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn take_utf8(&mut self) -> String {
        match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                let text = text.to_string();
                self.pending_bytes.clear();
                text
            }
            Err(error) => {
                let valid = error.valid_up_to();
                if error.error_len().is_none() {
                    // Truncated multi-byte character; keep the tail for the next read.
                    let tail = self.pending_bytes.split_off(valid);
                    let head = std::mem::replace(&mut self.pending_bytes, tail);
                    String::from_utf8_lossy(&head).into_owned()
                } else {
                    let bytes = std::mem::take(&mut self.pending_bytes);
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            }
        }
    }

    fn push_text(&mut self, text: &str, chunks: &mut Vec<InputChunk>) {
        if self.in_paste {
            self.paste.push_str(text);
            self.finish_paste(chunks);
            return;
        }

        self.pending.push_str(text);
        if let Some(start) = self.pending.find(PASTE_START) {
            let before = self.pending[..start].to_string();
            let after = self.pending[start + PASTE_START.len()..].to_string();
            self.pending.clear();
            let remainder = split_sequences(&before, chunks);
            if !remainder.is_empty() {
                chunks.push(InputChunk::Key(remainder));
            }
            self.in_paste = true;
            self.paste.push_str(&after);
            self.finish_paste(chunks);
            return;
        }

        let buffered = std::mem::take(&mut self.pending);
        self.pending = split_sequences(&buffered, chunks);
    }

    fn finish_paste(&mut self, chunks: &mut Vec<InputChunk>) {
        let Some(end) = self.paste.find(PASTE_END) else {
            return;
        };
        let rest = self.paste[end + PASTE_END.len()..].to_string();
        self.paste.truncate(end);
        chunks.push(InputChunk::Paste(std::mem::take(&mut self.paste)));
        self.in_paste = false;
        if !rest.is_empty() {
            self.push_text(&rest, chunks);
        }
    }
}

/// Pushes every complete unit and returns the incomplete escape tail.
fn split_sequences(text: &str, chunks: &mut Vec<InputChunk>) -> String {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] != ESC {
            let Some(ch) = text[pos..].chars().next() else {
                break;
            };
            chunks.push(InputChunk::Key(ch.to_string()));
            pos += ch.len_utf8();
            continue;
        }

        let mut end = pos + 1;
        loop {
            if end > bytes.len() {
                return text[pos..].to_string();
            }
            if !text.is_char_boundary(end) {
                end += 1;
                continue;
            }
            if escape_completeness(&text[pos..end]) == Completeness::Complete {
                chunks.push(InputChunk::Key(text[pos..end].to_string()));
                pos = end;
                break;
            }
            end += 1;
        }
    }
    String::new()
}

fn escape_completeness(sequence: &str) -> Completeness {
    let bytes = sequence.as_bytes();
    match bytes.get(1) {
        None => Completeness::Incomplete,
        Some(b'[') => csi_completeness(&bytes[2..]),
        Some(b'O') if bytes.len() < 3 => Completeness::Incomplete,
        Some(b']') => {
            if sequence.ends_with('\x07') || (bytes.len() > 3 && sequence.ends_with("\x1b\\")) {
                Completeness::Complete
            } else {
                Completeness::Incomplete
            }
        }
        Some(_) => Completeness::Complete,
    }
}

fn csi_completeness(payload: &[u8]) -> Completeness {
    match payload.last() {
        Some(last) if (0x40..=0x7e).contains(last) => Completeness::Complete,
        _ => Completeness::Incomplete,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;

    use super::{InputBuffer, InputChunk};

    fn key(text: &str) -> InputChunk {
        InputChunk::Key(text.to_string())
    }

    #[test]
    fn plain_text_splits_into_characters() {
        let mut buffer = InputBuffer::new(10);
        assert_eq!(buffer.process(b"hi"), vec![key("h"), key("i")]);
    }

    #[test]
    fn escape_sequences_survive_split_reads() {
        let mut buffer = InputBuffer::new(10);
        assert!(buffer.process(b"\x1b").is_empty());
        assert!(buffer.process(b"[").is_empty());
        assert_eq!(buffer.process(b"Ax"), vec![key("\x1b[A"), key("x")]);

        assert!(buffer.process(b"\x1bO").is_empty());
        assert_eq!(buffer.process(b"H"), vec![key("\x1bOH")]);
    }

    #[test]
    fn lone_escape_flushes_after_timeout_exactly_once() {
        let mut buffer = InputBuffer::new(10);
        let start = Instant::now();
        assert!(buffer.process_at(b"\x1b", start).is_empty());
        assert_eq!(buffer.next_timeout_ms(start, 50), 10);

        assert!(buffer.flush_due(start + Duration::from_millis(5)).is_empty());
        assert_eq!(
            buffer.flush_due(start + Duration::from_millis(11)),
            vec![key("\x1b")]
        );
        assert!(buffer.flush_due(start + Duration::from_millis(50)).is_empty());
        assert_eq!(buffer.next_timeout_ms(start, 50), 50);
    }

    #[test]
    fn alt_prefixed_character_is_one_key() {
        let mut buffer = InputBuffer::new(10);
        assert_eq!(buffer.process(b"\x1bb"), vec![key("\x1bb")]);
    }

    #[test]
    fn bracketed_paste_is_collected_across_reads() {
        let mut buffer = InputBuffer::new(10);
        assert_eq!(buffer.process(b"a\x1b[200~line one\r\n"), vec![key("a")]);
        assert!(buffer.process(b"line two").is_empty());
        assert_eq!(
            buffer.process(b"\x1b[201~b"),
            vec![
                InputChunk::Paste("line one\r\nline two".to_string()),
                key("b")
            ]
        );
    }

    #[test]
    fn multibyte_characters_split_across_reads_are_rejoined() {
        let mut buffer = InputBuffer::new(10);
        let bytes = "é".as_bytes();
        assert!(buffer.process(&bytes[..1]).is_empty());
        assert_eq!(buffer.process(&bytes[1..]), vec![key("é")]);
    }

    #[test]
    fn clear_drops_pending_state() {
        let mut buffer = InputBuffer::new(10);
        buffer.process(b"\x1b[");
        assert_eq!(buffer.pending(), "\x1b[");
        buffer.clear();
        assert_eq!(buffer.pending(), "");
        assert_eq!(buffer.next_timeout_ms(Instant::now(), 77), 77);
    }
}
