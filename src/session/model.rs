//! Terminal-free state machine for one input session.

use std::time::{Duration, Instant};

use crate::core::input::Key;
use crate::session::buffer::TextBuffer;

pub const SUBMIT_TOKEN: &str = "END";
pub const CLEAR_TOKEN: &str = "CLEAR";
pub const EXIT_TOKEN: &str = "exit";

const TAB_SPACES: &str = "    ";

/// Everything that can drive the session forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Key(Key),
    Paste(String),
    /// One-second clock tick; only affects rendering.
    Tick,
    EnableTimer,
    DisableTimer,
    /// Number of callers currently waiting on the broker.
    Callers(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Submitted(String),
    /// The operator typed the `exit` token.
    Exit,
    /// Cancel key, or the abort chord on an empty buffer.
    Aborted,
}

impl SessionState {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, SessionState::Editing)
    }
}

/// Countdown shown in the prompt. Freezes at the first content keystroke.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    timeout: Duration,
    started_at: Instant,
    frozen: Option<Duration>,
    visible: bool,
}

impl IdleTimer {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            started_at: now,
            frozen: None,
            visible: false,
        }
    }

    /// Restarts the countdown and shows it. A frozen value is kept.
    pub fn enable(&mut self, now: Instant) {
        self.started_at = now;
        self.visible = true;
    }

    pub fn disable(&mut self) {
        self.visible = false;
    }

    pub fn freeze(&mut self, now: Instant) {
        if self.frozen.is_none() {
            self.frozen = Some(self.live_remaining(now));
        }
    }

    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.frozen.unwrap_or_else(|| self.live_remaining(now))
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    fn live_remaining(&self, now: Instant) -> Duration {
        self.timeout
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }
}

/// Editing state plus the status shown in the prompt line.
#[derive(Debug, Clone)]
pub struct SessionModel {
    buffer: TextBuffer,
    state: SessionState,
    timer: IdleTimer,
    callers: usize,
}

impl SessionModel {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            buffer: TextBuffer::new(),
            state: SessionState::Editing,
            timer: IdleTimer::new(timeout, now),
            callers: 0,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn timer(&self) -> &IdleTimer {
        &self.timer
    }

    #[must_use]
    pub fn callers(&self) -> usize {
        self.callers
    }

    /// Whether the buffer holds any characters.
    #[must_use]
    pub fn has_input(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Applies one event. Returns `true` when the view needs a redraw.
    pub fn update(&mut self, event: SessionEvent, now: Instant) -> bool {
        if self.state.is_finished() {
            return false;
        }
        match event {
            SessionEvent::Key(key) => {
                if key.is_content() {
                    self.timer.freeze(now);
                }
                self.handle_key(key);
                true
            }
            SessionEvent::Paste(text) => {
                self.timer.freeze(now);
                self.buffer.insert_str(&text);
                true
            }
            SessionEvent::Tick => self.timer.is_visible() && !self.timer.is_frozen(),
            SessionEvent::EnableTimer => {
                self.timer.enable(now);
                true
            }
            SessionEvent::DisableTimer => {
                self.timer.disable();
                true
            }
            SessionEvent::Callers(count) => {
                let changed = self.callers != count;
                self.callers = count;
                changed
            }
        }
    }

    fn handle_key(&mut self, key: Key) {
        match key {
            Key::Ctrl('c') | Key::Escape => self.state = SessionState::Aborted,
            Key::Ctrl('d') if self.buffer.text().trim().is_empty() => {
                self.state = SessionState::Aborted;
            }
            Key::Ctrl('d') | Key::Ctrl('s') => self.submit_whole_buffer(),
            Key::Enter => self.handle_enter(),
            Key::Ctrl('a') | Key::Home => self.buffer.move_home(),
            Key::Ctrl('e') | Key::End => self.buffer.move_end(),
            Key::Char(ch) => self.buffer.insert_char(ch),
            Key::Tab => self.buffer.insert_str(TAB_SPACES),
            Key::Backspace => self.buffer.backspace(),
            Key::Delete => self.buffer.delete(),
            Key::Left => self.buffer.move_left(),
            Key::Right => self.buffer.move_right(),
            Key::Up => self.buffer.move_up(),
            Key::Down => self.buffer.move_down(),
            Key::Ctrl(_) | Key::Unknown => {}
        }
    }

    fn submit_whole_buffer(&mut self) {
        let text = self.buffer.text();
        let mut content = text.trim();
        if let Some(prefix) = content.strip_suffix(SUBMIT_TOKEN) {
            content = prefix.trim();
        }
        match content {
            CLEAR_TOKEN => self.buffer.clear(),
            EXIT_TOKEN => self.state = SessionState::Exit,
            _ => self.state = SessionState::Submitted(normalize_submission(content)),
        }
    }

    fn handle_enter(&mut self) {
        let lines = self.buffer.lines();
        let last = lines.last().map(|line| line.trim()).unwrap_or_default();

        if last == CLEAR_TOKEN {
            self.buffer.clear();
            return;
        }
        if last == EXIT_TOKEN {
            self.state = SessionState::Exit;
            return;
        }
        if let Some(prefix) = last.strip_suffix(SUBMIT_TOKEN) {
            let mut kept: Vec<&str> = lines[..lines.len() - 1]
                .iter()
                .map(String::as_str)
                .collect();
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                kept.push(prefix);
            }
            let content = kept.join("\n");
            self.state = SessionState::Submitted(normalize_submission(content.trim()));
            return;
        }
        self.buffer.newline();
    }
}

/// Drops blank lines and keeps the rest verbatim.
#[must_use]
pub fn normalize_submission(content: &str) -> String {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
