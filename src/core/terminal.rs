//! Terminal trait and lifecycle guard.

use std::io;

/// Minimal terminal interface for the input session.
pub trait Terminal {
    /// Enter raw mode and enable bracketed paste.
    fn start(&mut self) -> io::Result<()>;

    /// Disable bracketed paste and restore the original terminal mode.
    fn stop(&mut self) -> io::Result<()>;

    /// Wait up to `timeout_ms` for input. `Ok(None)` means nothing arrived in time;
    /// `Ok(Some(empty))` means end of input.
    fn read_input(&mut self, timeout_ms: i32) -> io::Result<Option<Vec<u8>>>;

    /// Write output to the terminal.
    fn write(&mut self, data: &str) -> io::Result<()>;

    /// Terminal width in cells.
    fn columns(&self) -> u16;
}

/// RAII guard that stops the terminal on drop.
pub struct TerminalGuard<'a, T: Terminal + ?Sized> {
    terminal: &'a mut T,
    stopped: bool,
}

impl<'a, T: Terminal + ?Sized> TerminalGuard<'a, T> {
    /// Starts `terminal`; it is stopped again when the guard drops.
    pub fn start(terminal: &'a mut T) -> io::Result<Self> {
        terminal.start()?;
        Ok(Self {
            terminal,
            stopped: false,
        })
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        self.terminal
    }

    /// Stops the terminal now, reporting any restore failure.
    pub fn stop(mut self) -> io::Result<()> {
        self.stopped = true;
        self.terminal.stop()
    }
}

impl<T: Terminal + ?Sized> Drop for TerminalGuard<'_, T> {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.terminal.stop();
        }
    }
}
