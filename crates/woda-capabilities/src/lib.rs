//! Privileged capabilities exposed to page script over the bridge.
//!
//! - `fileSystemHandler`: sandboxed file operations with a listing cache
//! - `codeExecutor`: snippet evaluation and the generic `{type, ...}` entry
//!   point, including PDF downloads

pub mod data_uri;
pub mod download;
pub mod executor;
pub mod fs;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use woda_bridge::{Bridge, WorkerPool};
use woda_common::{BridgeError, CapabilityError};
use woda_config::{SettingsStore, WodaConfig};

pub use download::{DownloadDirPrompt, PdfDownloader, SaveLocationPrompt};
pub use executor::interpreter::Interpreter;
pub use executor::CodeExecutor;
pub use fs::sandbox::Sandbox;
pub use fs::FileSystemCapability;

/// Tagged payload types handled by `codeExecutor.executeSignal`.
pub const EXECUTOR_SIGNAL_TYPES: &[&str] = &["executePython", "downloadPDF"];

/// The default capability objects, sharing one worker pool.
pub struct CapabilitySet {
    pub filesystem: FileSystemCapability,
    pub executor: CodeExecutor,
}

impl CapabilitySet {
    /// Build from config. `base_override` replaces `[filesystem] base_path`.
    pub fn from_config(
        config: &WodaConfig,
        base_override: Option<PathBuf>,
        settings: Option<Arc<SettingsStore>>,
    ) -> Result<Self, CapabilityError> {
        let base = base_override
            .or_else(|| config.filesystem.resolved_base_path())
            .ok_or_else(|| CapabilityError::DirectoryNotFound("home directory".into()))?;
        let sandbox = Sandbox::open(&base, config.filesystem.create_base)?;
        let workers = WorkerPool::new(config.workers.pool_size);

        let prompt =
            DownloadDirPrompt::new(settings.clone(), config.downloads.resolved_directory());
        let downloads = PdfDownloader::new(Arc::new(prompt), settings, workers.clone());
        let executor = CodeExecutor::new(
            Interpreter::from_config(&config.executor),
            downloads,
            workers.clone(),
        );

        Ok(Self {
            filesystem: FileSystemCapability::new(sandbox, workers),
            executor,
        })
    }

    /// Register both objects and route the tagged payload types.
    pub fn register(&self, bridge: &Bridge) -> Result<(), BridgeError> {
        bridge.register(fs::OBJECT_ID, Arc::new(self.filesystem.clone()))?;
        bridge.register(executor::OBJECT_ID, Arc::new(self.executor.clone()))?;
        for kind in EXECUTOR_SIGNAL_TYPES {
            bridge
                .dispatcher()
                .route_tagged(*kind, executor::OBJECT_ID, "executeSignal");
        }
        info!(objects = ?bridge.registry().ids(), "capabilities registered");
        Ok(())
    }
}
