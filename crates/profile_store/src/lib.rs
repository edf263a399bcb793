mod config;
mod error;
pub mod guidelines;
mod paths;
mod store;

pub use config::{Config, Mode, DEFAULT_EDITOR};
pub use error::ProfileStoreError;
pub use paths::{default_root, with_md_suffix};
pub use store::{ActiveProfile, ProfileStore};
