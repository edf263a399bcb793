//! One interactive follow-up collection: tty editor or line-buffered fallback.

pub mod buffer;
pub mod line_mode;
pub mod model;
pub mod view;

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EnvConfig;
use crate::core::input::parse_key;
use crate::core::terminal::{Terminal, TerminalGuard};
use crate::platform::input_buffer::{InputBuffer, InputChunk};
use crate::platform::ProcessTerminal;
use crate::session::line_mode::{LineCollector, LineOutcome, LineSplitter};
use crate::session::model::{SessionEvent, SessionModel, SessionState};
use crate::session::view::{Frame, InlineView, ViewOptions};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

const ESCAPE_TIMEOUT_MS: u64 = 10;
const POLL_MS: i32 = 50;
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SessionError {
    /// The owning lifetime was cancelled while the operator was still editing.
    #[error("input session cancelled")]
    Cancelled,

    #[error("input closed before a follow-up was submitted")]
    InputClosed,

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    #[must_use]
    pub fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

/// How a session ended when it was not cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Submitted(String),
    /// The operator asked to end the whole conversation.
    Exit,
    /// The operator dismissed this session only.
    Aborted,
}

/// Shared cancellation flag for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionLifetime {
    cancelled: Arc<AtomicBool>,
}

impl SessionLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    EnableTimer,
    DisableTimer,
    Callers(usize),
}

impl From<SessionControl> for SessionEvent {
    fn from(control: SessionControl) -> Self {
        match control {
            SessionControl::EnableTimer => SessionEvent::EnableTimer,
            SessionControl::DisableTimer => SessionEvent::DisableTimer,
            SessionControl::Callers(count) => SessionEvent::Callers(count),
        }
    }
}

/// Owner-side handle for steering a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    controls: Sender<SessionControl>,
    lifetime: SessionLifetime,
}

impl SessionHandle {
    pub fn enable_timer(&self) {
        self.send(SessionControl::EnableTimer);
    }

    pub fn disable_timer(&self) {
        self.send(SessionControl::DisableTimer);
    }

    pub fn set_callers(&self, count: usize) {
        self.send(SessionControl::Callers(count));
    }

    pub fn cancel(&self) {
        self.lifetime.cancel();
    }

    #[must_use]
    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }

    fn send(&self, control: SessionControl) {
        // A finished session drops its receiver; late controls are meaningless.
        let _ = self.controls.send(control);
    }
}

/// Session-side end of [`session_channel`].
#[derive(Debug)]
pub struct SessionControls {
    controls: Receiver<SessionControl>,
    lifetime: SessionLifetime,
}

impl SessionControls {
    #[must_use]
    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }

    fn drain(&self) -> Vec<SessionControl> {
        self.controls.try_iter().collect()
    }
}

pub fn session_channel() -> (SessionHandle, SessionControls) {
    let (tx, rx) = mpsc::channel();
    let lifetime = SessionLifetime::new();
    (
        SessionHandle {
            controls: tx,
            lifetime: lifetime.clone(),
        },
        SessionControls {
            controls: rx,
            lifetime,
        },
    )
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub view: ViewOptions,
    pub line_mode: bool,
    pub env: EnvConfig,
}

impl SessionOptions {
    pub fn from_env() -> Self {
        Self::with_env(EnvConfig::from_env())
    }

    pub fn with_env(env: EnvConfig) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            view: ViewOptions {
                timer: !env.hide_timer,
                callers: false,
            },
            line_mode: env.line_mode,
            env,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Show the waiting-caller status in the prompt line.
    pub fn with_caller_status(mut self, enabled: bool) -> Self {
        self.view.callers = enabled;
        self
    }
}

/// Cancels the session lifetime on SIGTERM/SIGHUP so raw mode is always restored.
#[cfg(unix)]
struct SignalCancel {
    ids: Vec<signal_hook::SigId>,
}

#[cfg(unix)]
impl SignalCancel {
    fn register(lifetime: &SessionLifetime) -> Self {
        let mut ids = Vec::new();
        for signal in [libc::SIGTERM, libc::SIGHUP] {
            match signal_hook::flag::register(signal, Arc::clone(&lifetime.cancelled)) {
                Ok(id) => ids.push(id),
                Err(error) => warn!(signal, %error, "failed to register session signal"),
            }
        }
        Self { ids }
    }
}

#[cfg(unix)]
impl Drop for SignalCancel {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Collects one follow-up, choosing the tty editor when stdin is a terminal.
#[cfg(unix)]
pub fn collect_input(
    options: &SessionOptions,
    controls: &SessionControls,
    on_input: &mut dyn FnMut(bool),
) -> Result<SessionOutcome, SessionError> {
    if !options.line_mode && io::stdin().is_terminal() {
        let mut terminal = ProcessTerminal::with_config(&options.env);
        return run_session(&mut terminal, options, controls, on_input);
    }
    let mut stdout = io::stdout();
    run_line_session(libc::STDIN_FILENO, &mut stdout, controls, on_input)
}

#[cfg(not(unix))]
pub fn collect_input(
    _options: &SessionOptions,
    _controls: &SessionControls,
    _on_input: &mut dyn FnMut(bool),
) -> Result<SessionOutcome, SessionError> {
    Err(SessionError::io(
        "opening terminal",
        io::Error::new(io::ErrorKind::Unsupported, "input sessions require a Unix terminal"),
    ))
}

/// Runs the interactive editor on `terminal` until it finishes or is cancelled.
pub fn run_session<T: Terminal + ?Sized>(
    terminal: &mut T,
    options: &SessionOptions,
    controls: &SessionControls,
    on_input: &mut dyn FnMut(bool),
) -> Result<SessionOutcome, SessionError> {
    #[cfg(unix)]
    let _signals = SignalCancel::register(&controls.lifetime);

    let columns = terminal.columns();
    let mut guard = TerminalGuard::start(terminal)
        .map_err(|source| SessionError::io("starting terminal", source))?;
    let mut model = SessionModel::new(options.timeout, Instant::now());
    let mut input = InputBuffer::new(ESCAPE_TIMEOUT_MS);
    let mut view = InlineView::new();
    let mut next_tick = Instant::now() + TICK;
    let mut had_input = false;
    let mut dirty = true;

    loop {
        let now = Instant::now();
        if controls.lifetime.is_cancelled() {
            let frame = Frame::build(&model, options.view, columns, now);
            let _ = guard.terminal_mut().write(&view.finish(&frame));
            debug!("input session cancelled");
            return Err(SessionError::Cancelled);
        }

        for control in controls.drain() {
            dirty |= model.update(control.into(), now);
        }
        if now >= next_tick {
            dirty |= model.update(SessionEvent::Tick, now);
            while next_tick <= now {
                next_tick += TICK;
            }
        }
        if dirty {
            let frame = Frame::build(&model, options.view, columns, now);
            guard
                .terminal_mut()
                .write(&view.redraw(&frame))
                .map_err(|source| SessionError::io("rendering", source))?;
            dirty = false;
        }

        let until_tick = next_tick.saturating_duration_since(now).as_millis();
        let timeout = input.next_timeout_ms(now, POLL_MS.min(until_tick.min(i32::MAX as u128) as i32));
        let chunks = match guard
            .terminal_mut()
            .read_input(timeout)
            .map_err(|source| SessionError::io("reading input", source))?
        {
            None => input.flush_due(Instant::now()),
            Some(bytes) if bytes.is_empty() => return Err(SessionError::InputClosed),
            Some(bytes) => input.process(&bytes),
        };

        for chunk in chunks {
            let event = match chunk {
                InputChunk::Key(sequence) => SessionEvent::Key(parse_key(&sequence)),
                InputChunk::Paste(text) => SessionEvent::Paste(text),
            };
            dirty |= model.update(event, Instant::now());
            if model.has_input() != had_input {
                had_input = model.has_input();
                on_input(had_input);
            }
            if model.state().is_finished() {
                break;
            }
        }

        let outcome = match model.state() {
            SessionState::Editing => continue,
            SessionState::Submitted(text) => SessionOutcome::Submitted(text.clone()),
            SessionState::Exit => SessionOutcome::Exit,
            SessionState::Aborted => SessionOutcome::Aborted,
        };
        let frame = Frame::build(&model, options.view, columns, Instant::now());
        guard
            .terminal_mut()
            .write(&view.finish(&frame))
            .map_err(|source| SessionError::io("rendering", source))?;
        guard
            .stop()
            .map_err(|source| SessionError::io("restoring terminal", source))?;
        return Ok(outcome);
    }
}

/// Reads newline-terminated lines from `fd` until a submit token, `exit`, or cancellation.
#[cfg(unix)]
pub fn run_line_session(
    fd: libc::c_int,
    out: &mut dyn Write,
    controls: &SessionControls,
    on_input: &mut dyn FnMut(bool),
) -> Result<SessionOutcome, SessionError> {
    use crate::platform::process_terminal::{poll_readable, read_available};

    let mut collector = LineCollector::new();
    let mut splitter = LineSplitter::default();
    line_mode::write_prompt(out, collector.prompt())
        .map_err(|source| SessionError::io("writing prompt", source))?;

    loop {
        if controls.lifetime.is_cancelled() {
            let _ = writeln!(out);
            return Err(SessionError::Cancelled);
        }
        // Controls only steer the tty view; discard them here.
        controls.drain();

        let readable =
            poll_readable(fd, POLL_MS).map_err(|source| SessionError::io("polling input", source))?;
        if !readable {
            continue;
        }
        let bytes = read_available(fd).map_err(|source| SessionError::io("reading input", source))?;
        let eof = bytes.is_empty();
        let mut lines = splitter.push(&bytes);
        if eof {
            lines.extend(splitter.take_rest());
        }

        for line in lines {
            on_input(true);
            match collector.feed(&line) {
                LineOutcome::Continue => {
                    line_mode::write_prompt(out, collector.prompt())
                        .map_err(|source| SessionError::io("writing prompt", source))?;
                }
                LineOutcome::Submitted(text) => return Ok(SessionOutcome::Submitted(text)),
                LineOutcome::Exit => return Ok(SessionOutcome::Exit),
            }
        }

        if eof {
            return Err(SessionError::InputClosed);
        }
    }
}
