//! Platform-specific terminal integrations.

pub mod input_buffer;
pub mod process_terminal;

pub use process_terminal::ProcessTerminal;
