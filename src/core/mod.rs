//! Core interfaces and types.

pub mod input;
pub mod terminal;
