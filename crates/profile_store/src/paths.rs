use std::path::{Path, PathBuf};

use crate::error::ProfileStoreError;

pub const APP_DIR: &str = "whats_next";
pub const GROUP_DIR: &str = "group";
pub const CONFIG_FILE: &str = "config.json";
pub const CUSTOM_FILE: &str = "custom.md";
pub const PROFILE_EXTENSION: &str = ".md";

/// `<user config dir>/whats_next`.
pub fn default_root() -> Result<PathBuf, ProfileStoreError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ProfileStoreError::NoConfigDir)
}

#[must_use]
pub fn with_md_suffix(name: &str) -> String {
    if name.ends_with(PROFILE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{PROFILE_EXTENSION}")
    }
}

#[must_use]
pub fn strip_md_suffix(file_name: &str) -> &str {
    file_name.strip_suffix(PROFILE_EXTENSION).unwrap_or(file_name)
}

/// Profile names map to a single file inside the group directory.
pub fn profile_file(group_dir: &Path, name: &str) -> Result<PathBuf, ProfileStoreError> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\']);
    if invalid {
        return Err(ProfileStoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(group_dir.join(with_md_suffix(trimmed)))
}
