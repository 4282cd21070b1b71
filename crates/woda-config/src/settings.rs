//! Key-value settings shared with the browser shell.
//!
//! The shell persists its open tabs here; the bridge only reads and writes
//! `lastDownloadDirectory`. Writes are atomic (write to `.tmp`, then rename).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use woda_common::ConfigError;

use crate::toml_loader::config_dir;

/// Persisted shell settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "openTabs")]
    pub open_tabs: Vec<String>,
    #[serde(
        rename = "lastDownloadDirectory",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_download_directory: Option<String>,
}

/// A settings file plus its in-memory copy.
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Open the store at `path`. A missing file yields empty settings; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "settings file unreadable, starting empty");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    /// Open `settings.toml` in the platform config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::open(config_dir()?.join("settings.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    pub fn last_download_directory(&self) -> Option<PathBuf> {
        self.lock().last_download_directory.as_ref().map(PathBuf::from)
    }

    pub fn set_last_download_directory(&self, dir: &Path) -> Result<(), ConfigError> {
        self.update(|s| s.last_download_directory = Some(dir.to_string_lossy().into_owned()))
    }

    pub fn open_tabs(&self) -> Vec<String> {
        self.lock().open_tabs.clone()
    }

    pub fn set_open_tabs(&self, tabs: Vec<String>) -> Result<(), ConfigError> {
        self.update(|s| s.open_tabs = tabs)
    }

    fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<(), ConfigError> {
        let snapshot = {
            let mut guard = self.lock();
            f(&mut guard);
            guard.clone()
        };
        self.write(&snapshot)
    }

    fn write(&self, settings: &Settings) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(settings)
            .map_err(|e| ConfigError::ParseError(format!("failed to serialize settings: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::ParseError(format!(
                    "failed to create settings directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &toml_str).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to write settings to {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!("atomic rename failed ({}), falling back to direct write", e);
            std::fs::write(&self.path, &toml_str).map_err(|e2| {
                ConfigError::ParseError(format!(
                    "failed to write settings to {}: {e2}",
                    self.path.display()
                ))
            })?;
        }

        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        // A poisoned lock still holds the last written settings.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
