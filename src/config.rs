//! Environment configuration.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Force the line-oriented reader even when stdin is a terminal.
    pub line_mode: bool,
    /// Hide the countdown in the prompt line.
    pub hide_timer: bool,
    /// Append every byte written to the terminal to this file.
    pub write_log: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            line_mode: env_flag("WHATS_NEXT_LINE_MODE"),
            hide_timer: env_flag("WHATS_NEXT_NO_TIMER"),
            write_log: env_string_opt("WHATS_NEXT_WRITE_LOG").map(PathBuf::from),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
