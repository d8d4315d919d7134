//! Locating the external binaries video conversion depends on.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Binaries reported by [`check_tools`].
pub const VIDEO_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Availability of one external binary.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolve `name` on PATH and ask it for its version.
///
/// A binary that is found but fails `-version` is reported unavailable.
pub fn probe_tool(name: &str) -> ToolInfo {
    let path = which::which(name).ok();
    let version = path.as_ref().and_then(|p| {
        let output = Command::new(p).arg("-version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(str::to_string)
    });

    ToolInfo {
        name: name.to_string(),
        available: version.is_some(),
        version,
        path,
    }
}

/// Probe every tool in [`VIDEO_TOOLS`].
pub fn check_tools() -> Vec<ToolInfo> {
    VIDEO_TOOLS.iter().map(|name| probe_tool(name)).collect()
}

/// Path of `name` on PATH.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// A configured path when it exists, otherwise a PATH lookup.
pub fn get_tool_path(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => {
            tracing::warn!(tool = name, "Configured path {:?} does not exist, using PATH", path);
            require_tool(name)
        }
        None => require_tool(name),
    }
}
