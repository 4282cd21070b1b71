//! Directory listings as script sees them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use woda_common::CapabilityError;

use super::sandbox::relative_display;

/// Name of the placeholder entry returned while a listing is being fetched.
pub const LOADING_NAME: &str = "Loading...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_file: bool,
    /// Relative to the sandbox base, `/`-separated.
    pub path: String,
}

/// One-entry placeholder listing.
pub fn loading_listing() -> Vec<DirEntry> {
    vec![DirEntry {
        name: LOADING_NAME.to_string(),
        is_dir: false,
        is_file: false,
        path: String::new(),
    }]
}

/// Read `absolute` (which is `relative` under the base), sorted by name.
pub fn read_listing(absolute: &Path, relative: &Path) -> Result<Vec<DirEntry>, CapabilityError> {
    if !absolute.is_dir() {
        return Err(CapabilityError::DirectoryNotFound(relative_display(relative)));
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(absolute)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Follow links so a link to a directory lists as a directory.
        let (is_dir, is_file) = match std::fs::metadata(entry.path()) {
            Ok(meta) => (meta.is_dir(), meta.is_file()),
            Err(_) => (false, false),
        };
        entries.push(DirEntry {
            path: relative_display(&relative.join(&name)),
            name,
            is_dir,
            is_file,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub fn to_json(entries: &[DirEntry]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}
