//! Range and sanity checks for a loaded [`WodaConfig`].

use woda_common::ConfigError;

use crate::schema::WodaConfig;

/// Validate a config, collecting every problem into one error.
pub fn validate(config: &WodaConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_range(
        "bridge.retry_interval_ms",
        config.bridge.retry_interval_ms,
        10,
        60_000,
        &mut errors,
    );
    validate_range(
        "bridge.max_pending_frames",
        config.bridge.max_pending_frames as u64,
        1,
        1_000_000,
        &mut errors,
    );
    validate_range(
        "workers.pool_size",
        config.workers.pool_size as u64,
        1,
        64,
        &mut errors,
    );

    if config.executor.program.trim().is_empty() {
        errors.push("executor.program must not be empty".to_string());
    }

    if let Some(base) = &config.filesystem.base_path {
        if !base.is_absolute() {
            errors.push(format!(
                "filesystem.base_path must be absolute, got {}",
                base.display()
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(field: &str, value: u64, min: u64, max: u64, errors: &mut Vec<String>) {
    if value < min || value > max {
        errors.push(format!("{field} must be between {min} and {max}, got {value}"));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&WodaConfig::default()).is_ok());
    }

    #[test]
    fn pool_size_zero_rejected() {
        let mut config = WodaConfig::default();
        config.workers.pool_size = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("workers.pool_size"));
    }

    #[test]
    fn retry_interval_too_small_rejected() {
        let mut config = WodaConfig::default();
        config.bridge.retry_interval_ms = 1;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("bridge.retry_interval_ms"));
    }

    #[test]
    fn zero_pending_frames_rejected() {
        let mut config = WodaConfig::default();
        config.bridge.max_pending_frames = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("bridge.max_pending_frames"));
    }

    #[test]
    fn relative_base_path_rejected() {
        let mut config = WodaConfig::default();
        config.filesystem.base_path = Some(PathBuf::from("relative/dir"));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn multiple_errors_are_joined() {
        let mut config = WodaConfig::default();
        config.workers.pool_size = 1000;
        config.executor.program = "  ".into();
        let msg = validate(&config).unwrap_err().to_string();
        assert!(msg.contains("workers.pool_size"));
        assert!(msg.contains("executor.program"));
    }
}
