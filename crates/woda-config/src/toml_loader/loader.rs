//! Reading `config.toml`.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};
use woda_common::ConfigError;

use crate::schema::WodaConfig;
use crate::validation;

use super::paths::{create_default_config, default_config_path};

/// Parse config text. `origin` only labels error messages.
fn parse(content: &str, origin: &Path) -> Result<WodaConfig, ConfigError> {
    let config: WodaConfig = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", origin.display())))?;

    // Out-of-range values are kept; the schema defaults only fill gaps.
    if let Err(e) = validation::validate(&config) {
        warn!(path = %origin.display(), "config has invalid values: {e}");
    }
    Ok(config)
}

/// Read and parse `path`. Absent keys fall back to their defaults.
pub fn load_from_path(path: &Path) -> Result<WodaConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let config = parse(&content, path)?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load `config.toml` from the user config directory, seeding it with the
/// commented template on first run.
pub fn load_default() -> Result<WodaConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(WodaConfig::default())
        }
        loaded => loaded,
    }
}
