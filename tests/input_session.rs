use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use whats_next_tui::{
    run_session, session_channel, EnvConfig, SessionError, SessionOptions, SessionOutcome,
    Terminal,
};

/// Replays scripted reads; `None` entries simulate a poll timeout.
#[derive(Default)]
struct ScriptedTerminal {
    reads: VecDeque<Option<Vec<u8>>>,
    output: String,
    started: usize,
    stopped: usize,
}

impl ScriptedTerminal {
    fn typing(chunks: &[&[u8]]) -> Self {
        Self {
            reads: chunks.iter().map(|chunk| Some(chunk.to_vec())).collect(),
            ..Self::default()
        }
    }
}

impl Terminal for ScriptedTerminal {
    fn start(&mut self) -> io::Result<()> {
        self.started += 1;
        Ok(())
    }

    fn stop(&mut self) -> io::Result<()> {
        self.stopped += 1;
        Ok(())
    }

    fn read_input(&mut self, timeout_ms: i32) -> io::Result<Option<Vec<u8>>> {
        match self.reads.pop_front() {
            Some(read) => {
                if read.is_none() {
                    thread::sleep(Duration::from_millis(timeout_ms.max(0) as u64));
                }
                Ok(read)
            }
            None => {
                thread::sleep(Duration::from_millis(timeout_ms.max(0) as u64));
                Ok(None)
            }
        }
    }

    fn write(&mut self, data: &str) -> io::Result<()> {
        self.output.push_str(data);
        Ok(())
    }

    fn columns(&self) -> u16 {
        80
    }
}

fn options() -> SessionOptions {
    SessionOptions::with_env(EnvConfig::default()).with_caller_status(true)
}

#[test]
fn typed_text_with_end_token_is_submitted() {
    let mut terminal = ScriptedTerminal::typing(&[b"hello", b" world END", b"\r"]);
    let (_handle, controls) = session_channel();
    let mut transitions = Vec::new();

    let outcome = run_session(&mut terminal, &options(), &controls, &mut |has| {
        transitions.push(has)
    })
    .expect("session should finish");

    assert_eq!(outcome, SessionOutcome::Submitted("hello world".to_string()));
    assert_eq!(transitions, vec![true]);
    assert_eq!((terminal.started, terminal.stopped), (1, 1));
    assert!(terminal.output.contains("user> (staging)"));
    assert!(terminal.output.ends_with("\r\n"));
}

#[test]
fn multi_line_paste_then_ctrl_s_submits() {
    let mut terminal =
        ScriptedTerminal::typing(&[b"\x1b[200~line one\r\n\r\nline two\x1b[201~", b"\x13"]);
    let (_handle, controls) = session_channel();

    let outcome = run_session(&mut terminal, &options(), &controls, &mut |_| {})
        .expect("session should finish");
    assert_eq!(
        outcome,
        SessionOutcome::Submitted("line one\nline two".to_string())
    );
}

#[test]
fn exit_token_and_escape_are_distinguished() {
    let mut terminal = ScriptedTerminal::typing(&[b"exit\r"]);
    let (_handle, controls) = session_channel();
    let outcome = run_session(&mut terminal, &options(), &controls, &mut |_| {}).expect("exit");
    assert_eq!(outcome, SessionOutcome::Exit);

    let mut terminal = ScriptedTerminal::typing(&[b"draft", b"\x1b"]);
    let (_handle, controls) = session_channel();
    let outcome = run_session(&mut terminal, &options(), &controls, &mut |_| {}).expect("abort");
    assert_eq!(outcome, SessionOutcome::Aborted);
}

#[test]
fn backspacing_to_empty_reports_transition() {
    let mut terminal = ScriptedTerminal::typing(&[b"a", b"\x7f", b"b END\r"]);
    let (_handle, controls) = session_channel();
    let mut transitions = Vec::new();
    let outcome = run_session(&mut terminal, &options(), &controls, &mut |has| {
        transitions.push(has)
    })
    .expect("session should finish");
    assert_eq!(outcome, SessionOutcome::Submitted("b".to_string()));
    assert_eq!(transitions, vec![true, false, true]);
}

#[test]
fn cancelled_lifetime_ends_session_with_cancelled_error() {
    let mut terminal = ScriptedTerminal::default();
    let (handle, controls) = session_channel();
    handle.cancel();

    let result = run_session(&mut terminal, &options(), &controls, &mut |_| {});
    assert_matches!(result, Err(SessionError::Cancelled));
    assert_eq!(terminal.stopped, 1, "terminal must be restored");
}

#[test]
fn cancel_from_another_thread_interrupts_waiting_session() {
    let mut terminal = ScriptedTerminal::default();
    let (handle, controls) = session_channel();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(120));
        handle.cancel();
    });

    let result = run_session(&mut terminal, &options(), &controls, &mut |_| {});
    canceller.join().expect("canceller thread");
    assert_matches!(result, Err(SessionError::Cancelled));
}

#[test]
fn end_of_input_is_reported() {
    let mut terminal = ScriptedTerminal::typing(&[b"abc", b""]);
    let (_handle, controls) = session_channel();
    let result = run_session(&mut terminal, &options(), &controls, &mut |_| {});
    assert_matches!(result, Err(SessionError::InputClosed));
    assert_eq!(terminal.stopped, 1);
}

#[test]
fn owner_controls_update_prompt_line() {
    let mut terminal = ScriptedTerminal::typing(&[b"x"]);
    terminal.reads.push_back(None);
    terminal.reads.push_back(Some(b" END\r".to_vec()));
    let (handle, controls) = session_channel();
    handle.set_callers(2);
    handle.enable_timer();

    let outcome = run_session(&mut terminal, &options(), &controls, &mut |_| {}).expect("finish");
    assert_eq!(outcome, SessionOutcome::Submitted("x".to_string()));
    assert!(
        terminal.output.contains("> (2 clients connected)"),
        "prompt should show callers: {:?}",
        terminal.output
    );
    assert!(terminal.output.contains("user (2m 59s)>") || terminal.output.contains("user (3m 00s)>"));
}

#[test]
fn lone_escape_is_decoded_after_timeout() {
    let mut terminal = ScriptedTerminal::typing(&[b"\x1b"]);
    let (_handle, controls) = session_channel();
    let outcome = run_session(&mut terminal, &options(), &controls, &mut |_| {}).expect("abort");
    assert_eq!(outcome, SessionOutcome::Aborted);
}

#[cfg(unix)]
mod line_mode {
    use std::io::Write;
    use std::os::fd::{FromRawFd, OwnedFd};

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use whats_next_tui::{run_line_session, session_channel, SessionError, SessionOutcome};

    fn pipe_with(data: &[u8]) -> OwnedFd {
        let mut fds = [0; 2];
        let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(result, 0, "pipe failed");
        let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
        let mut write_end = std::fs::File::from(unsafe { OwnedFd::from_raw_fd(fds[1]) });
        write_end.write_all(data).expect("write pipe");
        drop(write_end);
        read_end
    }

    #[test]
    fn lines_until_end_token_are_submitted() {
        use std::os::fd::AsRawFd;

        let input = pipe_with(b"first\n\nsecond END\nignored\n");
        let (_handle, controls) = session_channel();
        let mut out = Vec::new();
        let mut typed = 0;
        let outcome = run_line_session(input.as_raw_fd(), &mut out, &controls, &mut |_| typed += 1)
            .expect("line session");

        assert_eq!(outcome, SessionOutcome::Submitted("first\nsecond".to_string()));
        assert_eq!(String::from_utf8_lossy(&out), "user> ...user> ");
        assert_eq!(typed, 3);
    }

    #[test]
    fn exit_line_ends_conversation() {
        use std::os::fd::AsRawFd;

        let input = pipe_with(b"exit\n");
        let (_handle, controls) = session_channel();
        let mut out = Vec::new();
        let outcome =
            run_line_session(input.as_raw_fd(), &mut out, &controls, &mut |_| {}).expect("exit");
        assert_eq!(outcome, SessionOutcome::Exit);
    }

    #[test]
    fn unterminated_input_reports_closed() {
        use std::os::fd::AsRawFd;

        let input = pipe_with(b"no terminator");
        let (_handle, controls) = session_channel();
        let mut out = Vec::new();
        let result = run_line_session(input.as_raw_fd(), &mut out, &controls, &mut |_| {});
        assert_matches!(result, Err(SessionError::InputClosed));
    }

    #[test]
    fn trailing_end_without_newline_still_submits() {
        use std::os::fd::AsRawFd;

        let input = pipe_with(b"quick END");
        let (_handle, controls) = session_channel();
        let mut out = Vec::new();
        let outcome =
            run_line_session(input.as_raw_fd(), &mut out, &controls, &mut |_| {}).expect("submit");
        assert_eq!(outcome, SessionOutcome::Submitted("quick".to_string()));
    }
}
