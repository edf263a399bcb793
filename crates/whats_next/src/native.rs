//! `mode: native`: collect the follow-up in this process instead of asking a broker.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::info;
use whats_next_tui::{session_channel, SessionError, SessionOutcome};

use crate::broker::InputSource;
use crate::compose::{thinking_text, Composer};

/// Runs one session and writes the reply to `out`.
///
/// If nothing is typed within `idle_timeout` the session is cancelled and the
/// thinking notice is written instead. Once the operator has typed, the wait
/// is unbounded.
pub fn run(
    source: &dyn InputSource,
    composer: &Composer,
    idle_timeout: Duration,
    working_dir: &Path,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let (session, controls) = session_channel();
    session.enable_timer();
    let has_typed = AtomicBool::new(false);
    let (done_tx, done_rx) = mpsc::channel();

    let typed = &has_typed;
    let outcome = thread::scope(|scope| {
        scope.spawn(move || {
            let result = source.collect(&controls, &mut |has_input| {
                if has_input {
                    typed.store(true, Ordering::Release);
                }
            });
            let _ = done_tx.send(result);
        });

        match done_rx.recv_timeout(idle_timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) if !has_typed.load(Ordering::Acquire) => {
                info!("operator idle, cancelling native session");
                session.cancel();
                let _ = done_rx.recv();
                None
            }
            Err(RecvTimeoutError::Timeout) => done_rx.recv().ok(),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    });

    match outcome {
        None | Some(Err(SessionError::Cancelled)) => writeln!(out, "{}", thinking_text())?,
        Some(Ok(SessionOutcome::Submitted(text))) => {
            writeln!(out, "{}", composer.compose(&text, Some(working_dir)))?;
        }
        Some(Ok(SessionOutcome::Exit | SessionOutcome::Aborted)) => writeln!(out, "exit")?,
        Some(Err(error)) => return Err(error.into()),
    }
    Ok(())
}
