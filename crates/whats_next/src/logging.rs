//! Subscriber setup for the client log file and the server's `--log` files.
//!
//! Nothing is written to the terminal: the server's terminal belongs to the
//! operator and the client's stdout is read by the agent.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::signals::{signal_name, SignalGuard};

pub const LOG_ENV: &str = "WHATS_NEXT_LOG";
pub const CLIENT_LOG_FILE: &str = ".whats_next.log";
pub const SERVER_LOG_DIR: &str = "logs";
pub const SERVER_INFO_FILE: &str = "info.txt";
pub const SERVER_ERROR_FILE: &str = "error.txt";

const DEFAULT_DIRECTIVE: &str = "info";

/// `WHATS_NEXT_LOG` when set and valid, otherwise `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// `~/.whats_next.log`
#[must_use]
pub fn client_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CLIENT_LOG_FILE))
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Appends every client event to `path`.
pub fn init_client_logging(path: &Path) -> anyhow::Result<()> {
    let file = open_append(path)?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(env_filter()),
        )
        .try_init()
        .context("failed to install client logger")
}

/// Writes INFO and up to `<dir>/info.txt` and errors to `<dir>/error.txt`.
pub fn init_server_logging(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create logs directory {}", dir.display()))?;
    let info_file = open_append(&dir.join(SERVER_INFO_FILE))?;
    let error_file = open_append(&dir.join(SERVER_ERROR_FILE))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(info_file))
                .with_filter(env_filter()),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(error_file))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .context("failed to install server logger")
}

/// Logs SIGINT, SIGTERM, SIGHUP and SIGQUIT, then lets each one act as it
/// would without a handler.
pub fn log_client_signals() -> Option<SignalGuard> {
    let signals = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT];
    match SignalGuard::install(&signals, |signal| {
        warn!(target: "whats_next::signal", signal = signal_name(signal), "received signal");
        if let Err(error) = signal_hook::low_level::emulate_default_handler(signal) {
            warn!(%error, "failed to re-raise signal");
        }
    }) {
        Ok(guard) => Some(guard),
        Err(error) => {
            warn!(%error, "failed to install signal logger");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tracing::info;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{fmt, Layer};

    use super::{client_log_path, open_append, CLIENT_LOG_FILE};

    #[test]
    fn client_log_lives_in_home() {
        if let Some(path) = client_log_path() {
            assert!(path.ends_with(CLIENT_LOG_FILE));
        }
    }

    #[test]
    fn appended_file_layer_keeps_previous_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.log");
        fs::write(&path, "earlier\n").expect("seed");

        let file = open_append(&path).expect("open");
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_filter(tracing_subscriber::filter::LevelFilter::INFO),
        );
        tracing::subscriber::with_default(subscriber, || {
            info!(pid = 42, "client request");
        });

        let written = fs::read_to_string(&path).expect("read");
        assert!(written.starts_with("earlier\n"));
        assert!(written.contains("client request"));
        assert!(written.contains("pid=42"));
    }
}
