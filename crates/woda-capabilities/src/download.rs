//! Saving generated PDFs handed over by page script.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Map;
use tracing::{info, warn};
use woda_bridge::{Value, WorkerPool};
use woda_common::CapabilityError;
use woda_config::SettingsStore;

use crate::data_uri::{decode_base64, DataUri};

const DEFAULT_FILENAME: &str = "download.pdf";

/// Picks where a download goes. `None` means the user cancelled.
pub trait SaveLocationPrompt: Send + Sync {
    fn choose(&self, suggested_name: &str) -> Option<PathBuf>;
}

/// Saves into the last used download directory, or the configured one,
/// without asking.
pub struct DownloadDirPrompt {
    settings: Option<Arc<SettingsStore>>,
    fallback: Option<PathBuf>,
}

impl DownloadDirPrompt {
    pub fn new(settings: Option<Arc<SettingsStore>>, fallback: Option<PathBuf>) -> Self {
        Self { settings, fallback }
    }
}

impl SaveLocationPrompt for DownloadDirPrompt {
    fn choose(&self, suggested_name: &str) -> Option<PathBuf> {
        let dir = self
            .settings
            .as_ref()
            .and_then(|s| s.last_download_directory())
            .or_else(|| self.fallback.clone())?;
        Some(dir.join(file_name_or_default(suggested_name)))
    }
}

/// Last component of `name`, or the default when there is none.
fn file_name_or_default(name: &str) -> String {
    Path::new(name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Payload after the first comma of a data URI, or the whole string.
fn decode_pdf_data(data: &str) -> Result<Vec<u8>, CapabilityError> {
    match DataUri::parse(data) {
        Some(uri) => uri.decode(),
        None => decode_base64(data.split_once(',').map_or(data, |(_, rest)| rest)),
    }
}

/// Handles `downloadPDF` payloads: decode, ask for a destination, write.
#[derive(Clone)]
pub struct PdfDownloader {
    prompt: Arc<dyn SaveLocationPrompt>,
    settings: Option<Arc<SettingsStore>>,
    workers: WorkerPool,
}

impl PdfDownloader {
    pub fn new(
        prompt: Arc<dyn SaveLocationPrompt>,
        settings: Option<Arc<SettingsStore>>,
        workers: WorkerPool,
    ) -> Self {
        Self {
            prompt,
            settings,
            workers,
        }
    }

    /// Save the PDF described by `fields` (`filename`, `data`). Returns the
    /// written path, or `None` if no destination was chosen.
    pub async fn download(
        &self,
        fields: &Map<String, Value>,
    ) -> Result<Option<PathBuf>, CapabilityError> {
        let filename = fields
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = fields.get("data").and_then(Value::as_str).ok_or_else(|| {
            CapabilityError::InvalidArgument("downloadPDF needs a data string".into())
        })?;
        let bytes = decode_pdf_data(data)?;

        let prompt = Arc::clone(&self.prompt);
        let written = self
            .workers
            .run(move || -> Result<Option<PathBuf>, CapabilityError> {
                let Some(path) = prompt.choose(&filename) else {
                    return Ok(None);
                };
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &bytes)?;
                Ok(Some(path))
            })
            .await??;

        let Some(path) = written else {
            info!("PDF download cancelled");
            return Ok(None);
        };
        info!(path = %path.display(), "PDF saved");

        if let (Some(settings), Some(parent)) = (&self.settings, path.parent()) {
            if let Err(e) = settings.set_last_download_directory(parent) {
                warn!(error = %e, "failed to remember download directory");
            }
        }
        Ok(Some(path))
    }
}
