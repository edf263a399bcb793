//! Terminal side of `whats_next`: one inline, multi-line follow-up session at a time.
//!
//! # Public API Overview
//! - [`collect_input`] runs a session on the process terminal, falling back to
//!   line-buffered stdin when no tty is attached.
//! - [`run_session`] drives the editor against any [`Terminal`], which is how tests
//!   script keystrokes.
//! - [`session_channel`] pairs a [`SessionHandle`] (owner: timer, caller count,
//!   cancellation) with the [`SessionControls`] consumed by the running session.
//! - [`SessionModel`] is the terminal-free state machine behind the editor.

pub mod config;
pub mod logging;

pub mod core;
pub mod platform;
pub mod session;

pub use crate::config::EnvConfig;
pub use crate::core::input::{parse_key, Key};
pub use crate::core::terminal::{Terminal, TerminalGuard};
pub use crate::platform::input_buffer::{InputBuffer, InputChunk};
pub use crate::platform::ProcessTerminal;
#[cfg(unix)]
pub use crate::session::run_line_session;
pub use crate::session::{
    collect_input, run_session, session_channel, SessionControl, SessionControls, SessionError,
    SessionHandle, SessionLifetime, SessionOptions, SessionOutcome, DEFAULT_TIMEOUT,
};
pub use crate::session::model::{normalize_submission, SessionEvent, SessionModel, SessionState};
pub use crate::session::view::{render_user_prompt, ViewOptions};
