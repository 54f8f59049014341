//! Open files with the desktop's default application

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Launch the OS handler for `path` and wait for it to return
pub fn open_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let status = opener_command(path)
        .status()
        .with_context(|| format!("Failed to launch a viewer for {}", path.display()))?;

    if !status.success() {
        anyhow::bail!("Viewer exited with {} for {}", status, path.display());
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    // The empty string is the window title `start` expects first
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}
