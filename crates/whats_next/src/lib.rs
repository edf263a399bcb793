//! Follow-up broker for coding agents.
//!
//! An agent runs `whats_next` when it finishes a task. The client asks the
//! broker on the loopback port for the next instruction; the broker owns the
//! operator's terminal, collects what they type and replies with the question
//! wrapped in the guidelines that apply to the agent's working directory.

pub mod broker;
pub mod cli;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod logging;
pub mod native;
pub mod server;
pub mod signals;

pub use broker::{Broker, InputMessage, InputSource, Producer, Reply, TerminalInput};
pub use client::{ClientError, FollowUpRequest};
pub use compose::{Composer, NoProfile, ProfileSource};
pub use config::BrokerConfig;
pub use error::BrokerError;
