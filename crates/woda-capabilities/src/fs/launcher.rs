//! Handing files to the OS default application.

use std::path::Path;
use std::process::Command;

use tracing::info;
use woda_common::CapabilityError;

pub trait Launcher: Send + Sync {
    fn open(&self, path: &Path) -> Result<(), CapabilityError>;
}

/// Uses `open` on macOS, `cmd /C start` on Windows and `xdg-open` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&self, path: &Path) -> Result<(), CapabilityError> {
        let status = platform_command(path).status().map_err(|e| {
            CapabilityError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to launch opener: {e}"),
            ))
        })?;

        if !status.success() {
            return Err(CapabilityError::Io(std::io::Error::other(format!(
                "opener exited with {status}"
            ))));
        }

        info!(path = %path.display(), "handed file to default application");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn platform_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(target_os = "windows")]
fn platform_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}
