//! Where config files live.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use woda_common::ConfigError;

use super::template::default_config_toml;

pub(crate) const APP_NAME: &str = "woda";

/// Per-user directory holding `config.toml` and `settings.toml`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| ConfigError::ParseError("no per-user config directory on this platform".into()))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Write the commented template to `path`. An existing file is left alone.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, e: std::io::Error| {
        ConfigError::ParseError(format!("cannot {what} {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
        Err(e) => return Err(io_err("create", e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_err("write", e))?;

    info!(path = %path.display(), "wrote default config");
    Ok(())
}
