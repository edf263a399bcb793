use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::ProfileStoreError;
use crate::guidelines;
use crate::paths::{self, CONFIG_FILE, CUSTOM_FILE, GROUP_DIR};

/// File-backed profiles and configuration rooted at one directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

/// The currently selected profile and its raw document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProfile {
    pub name: String,
    pub document: String,
}

impl ProfileStore {
    /// Store rooted at the per-user configuration directory.
    pub fn open_default() -> Result<Self, ProfileStoreError> {
        Ok(Self::at(paths::default_root()?))
    }

    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn group_dir(&self) -> PathBuf {
        self.root.join(GROUP_DIR)
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    #[must_use]
    pub fn custom_path(&self) -> PathBuf {
        self.root.join(CUSTOM_FILE)
    }

    pub fn profile_path(&self, name: &str) -> Result<PathBuf, ProfileStoreError> {
        paths::profile_file(&self.group_dir(), name)
    }

    /// A missing config file reads as the default config.
    pub fn read_config(&self) -> Result<Config, ProfileStoreError> {
        let path = self.config_path();
        let Some(raw) = read_optional(&path, "reading config")? else {
            return Ok(Config::default());
        };
        serde_json::from_str(&raw).map_err(|source| ProfileStoreError::ConfigParse { path, source })
    }

    pub fn write_config(&self, config: &Config) -> Result<(), ProfileStoreError> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(config).map_err(|source| {
            ProfileStoreError::ConfigSerialize {
                path: path.clone(),
                source,
            }
        })?;
        create_dir(&self.root)?;
        fs::write(&path, json).map_err(|source| ProfileStoreError::io("writing config", &path, source))
    }

    /// Profile names, sorted. A missing group directory means no profiles.
    pub fn list_profiles(&self) -> Result<Vec<String>, ProfileStoreError> {
        let dir = self.group_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ProfileStoreError::io("listing profiles", &dir, source));
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|source| ProfileStoreError::io("listing profiles", &dir, source))?;
            let is_dir = entry
                .file_type()
                .map_err(|source| ProfileStoreError::io("inspecting profile", entry.path(), source))?
                .is_dir();
            if is_dir {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            names.push(paths::strip_md_suffix(&file_name).to_string());
        }
        names.sort();
        Ok(names)
    }

    pub fn read_profile(&self, name: &str) -> Result<String, ProfileStoreError> {
        let path = self.profile_path(name)?;
        read_optional(&path, "reading profile")?.ok_or_else(|| ProfileStoreError::ProfileNotFound {
            name: name.to_string(),
            path,
        })
    }

    /// Path of an existing profile, creating it seeded with the built-in catalog if absent.
    pub fn ensure_profile(&self, name: &str) -> Result<PathBuf, ProfileStoreError> {
        let path = self.profile_path(name)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                return Err(ProfileStoreError::ProfileIsDirectory { path });
            }
            Ok(_) => return Ok(path),
            Err(source) if source.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(ProfileStoreError::io("inspecting profile", &path, source)),
        }

        create_dir(&self.group_dir())?;
        let seed = self.catalog_text()?;
        fs::write(&path, seed)
            .map_err(|source| ProfileStoreError::io("creating profile", &path, source))?;
        debug!(profile = %path.display(), "created profile from built-in catalog");
        Ok(path)
    }

    pub fn remove_profile(&self, name: &str) -> Result<(), ProfileStoreError> {
        let path = self.profile_path(name)?;
        fs::remove_file(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ProfileStoreError::ProfileNotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            _ => ProfileStoreError::io("removing profile", &path, source),
        })
    }

    /// Renames a profile. Never overwrites an existing profile.
    pub fn rename_profile(&self, old_name: &str, new_name: &str) -> Result<(), ProfileStoreError> {
        let old_path = self.profile_path(old_name)?;
        let new_path = self.profile_path(new_name)?;
        if !old_path.exists() {
            return Err(ProfileStoreError::ProfileNotFound {
                name: old_name.to_string(),
                path: old_path,
            });
        }
        if new_path.exists() {
            return Err(ProfileStoreError::ProfileExists {
                name: new_name.to_string(),
                path: new_path,
            });
        }
        fs::rename(&old_path, &new_path)
            .map_err(|source| ProfileStoreError::io("renaming profile", &old_path, source))
    }

    /// Records `name` as the selected profile. The profile must exist.
    pub fn select_profile(&self, name: &str) -> Result<(), ProfileStoreError> {
        let path = self.profile_path(name)?;
        if !path.is_file() {
            return Err(ProfileStoreError::ProfileNotFound {
                name: name.to_string(),
                path,
            });
        }
        let mut config = self.read_config()?;
        config.selected_profile = paths::strip_md_suffix(name.trim()).to_string();
        self.write_config(&config)
    }

    /// `None` when nothing is selected or the selected file cannot be read.
    #[must_use]
    pub fn active_profile(&self) -> Option<ActiveProfile> {
        let config = match self.read_config() {
            Ok(config) => config,
            Err(error) => {
                debug!(%error, "ignoring unreadable config");
                return None;
            }
        };
        let name = config.selected_profile()?.to_string();
        match self.read_profile(&name) {
            Ok(document) => Some(ActiveProfile { name, document }),
            Err(error) => {
                debug!(%error, profile = %name, "selected profile is unavailable");
                None
            }
        }
    }

    pub fn read_custom(&self) -> Result<Option<String>, ProfileStoreError> {
        read_optional(&self.custom_path(), "reading custom guidelines")
    }

    /// Path of the custom guideline file, creating the config directory if needed.
    pub fn custom_file(&self) -> Result<PathBuf, ProfileStoreError> {
        create_dir(&self.root)?;
        Ok(self.custom_path())
    }

    /// Appends an optional `# `-prefixed title line and the trimmed content.
    pub fn add_custom(&self, content: &str, title: Option<&str>) -> Result<(), ProfileStoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ProfileStoreError::EmptyContent);
        }

        let path = self.custom_file()?;
        let mut custom = self.read_custom()?.unwrap_or_default();
        if let Some(title) = title.filter(|title| !title.is_empty()) {
            if !title.starts_with("# ") {
                custom.push_str("# ");
            }
            custom.push_str(title);
            custom.push('\n');
        }
        custom.push_str(content);
        custom.push('\n');

        fs::write(&path, custom)
            .map_err(|source| ProfileStoreError::io("writing custom guidelines", &path, source))
    }

    /// Built-in catalog followed by the custom guideline file, when it has content.
    pub fn catalog_text(&self) -> Result<String, ProfileStoreError> {
        let mut out = guidelines::catalog_text();
        if let Some(custom) = self.read_custom()?.filter(|custom| !custom.is_empty()) {
            out.push_str(&format!("---- from: {} ----\n", self.custom_path().display()));
            out.push_str(&custom);
            out.push('\n');
        }
        Ok(out)
    }
}

fn read_optional(path: &Path, operation: &'static str) -> Result<Option<String>, ProfileStoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ProfileStoreError::io(operation, path, source)),
    }
}

fn create_dir(dir: &Path) -> Result<(), ProfileStoreError> {
    fs::create_dir_all(dir)
        .map_err(|source| ProfileStoreError::io("creating directory", dir, source))
}
