//! Woda configuration system.
//!
//! TOML-based configuration for the bridge host plus the small settings
//! store shared with the browser shell. All sections use defaults so a
//! partial config works out of the box.

pub mod schema;
pub mod settings;
pub mod toml_loader;
pub mod validation;

pub use schema::{WodaConfig, CONFIG_SCHEMA_VERSION};
pub use settings::{Settings, SettingsStore};

use std::path::Path;

use woda_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<WodaConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<WodaConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to pretty TOML.
pub fn config_to_toml(config: &WodaConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config)
        .map_err(|e| ConfigError::ParseError(format!("failed to serialize config to TOML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_toml_contains_all_sections() {
        let toml_str = config_to_toml(&WodaConfig::default()).unwrap();
        for section in [
            "[bridge]",
            "[filesystem]",
            "[executor]",
            "[workers]",
            "[logging]",
        ] {
            assert!(toml_str.contains(section), "missing {section}");
        }
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let toml_str = config_to_toml(&WodaConfig::default()).unwrap();
        let parsed: WodaConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.workers.pool_size, 4);
        assert_eq!(parsed.executor.program, "python3");
    }

    #[test]
    fn load_config_from_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[workers]\npool_size = 99\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
