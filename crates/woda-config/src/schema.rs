//! Configuration schema for the Woda bridge host.
//!
//! Every section uses `#[serde(default)]` so a partial `config.toml`
//! (or an empty one) deserializes into a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WodaConfig {
    pub schema_version: u32,
    pub bridge: BridgeConfig,
    pub filesystem: FileSystemConfig,
    pub executor: ExecutorConfig,
    pub workers: WorkersConfig,
    pub downloads: DownloadsConfig,
    pub logging: LoggingConfig,
}

impl Default for WodaConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            bridge: BridgeConfig::default(),
            filesystem: FileSystemConfig::default(),
            executor: ExecutorConfig::default(),
            workers: WorkersConfig::default(),
            downloads: DownloadsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How often undelivered frames are retried, in milliseconds
    /// (valid range: 10-60000).
    pub retry_interval_ms: u64,
    /// Frames held for a refusing transport before the oldest are dropped
    /// (valid range: 1-1000000).
    pub max_pending_frames: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 250,
            max_pending_frames: 10_000,
        }
    }
}

/// Sandbox settings for the file-system capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemConfig {
    /// Root directory all script-supplied paths are confined to.
    /// `None` means the user's home directory.
    pub base_path: Option<PathBuf>,
    /// Create the base directory on startup if it is missing.
    pub create_base: bool,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            create_base: true,
        }
    }
}

impl FileSystemConfig {
    /// The configured base path, falling back to the home directory.
    pub fn resolved_base_path(&self) -> Option<PathBuf> {
        self.base_path.clone().or_else(dirs::home_dir)
    }
}

/// Interpreter used by the code-execution capability. The snippet is
/// written to the interpreter's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["-".into()],
        }
    }
}

/// Blocking I/O worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Maximum concurrent blocking jobs (valid range: 1-64).
    pub pool_size: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { pool_size: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Fallback save directory when no `lastDownloadDirectory` is recorded.
    /// `None` means the platform download directory.
    pub directory: Option<PathBuf>,
}

impl DownloadsConfig {
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory.clone().or_else(dirs::download_dir)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "woda=info".into(),
        }
    }
}
