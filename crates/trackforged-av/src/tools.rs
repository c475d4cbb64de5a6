//! Finding ffmpeg before the first download needs it.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Result};

/// Result of looking for one binary, as `trackforged check-tools` prints it.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, e.g. `ffmpeg version 6.1.1`.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

impl ToolInfo {
    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        }
    }
}

/// Run `program version_flag` and record what it reports.
///
/// A binary that exits non-zero counts as unavailable.
pub fn check_tool_with_arg(program: &str, version_flag: &str) -> ToolInfo {
    let output = match Command::new(program).arg(version_flag).output() {
        Ok(output) if output.status.success() => output,
        _ => return ToolInfo::missing(program),
    };

    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string);

    let path = if Path::new(program).is_absolute() {
        Some(PathBuf::from(program))
    } else {
        which::which(program).ok()
    };

    ToolInfo {
        name: program.to_string(),
        available: true,
        version,
        path,
    }
}

/// Report on every binary a download shells out to. Today that is ffmpeg.
pub fn check_tools(ffmpeg_override: Option<&Path>) -> Vec<ToolInfo> {
    let ffmpeg = ffmpeg_override
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ffmpeg".to_string());
    vec![check_tool_with_arg(&ffmpeg, "-version")]
}

/// Resolve `name` to an executable: `tools.<name>_path` from config if it
/// points at a file, otherwise a `PATH` search.
pub fn get_tool_path(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.is_file() => return Ok(path.to_path_buf()),
        Some(path) => tracing::warn!(
            "tools.{}_path = {} is not a file, searching PATH instead",
            name,
            path.display()
        ),
        None => {}
    }

    which::which(name).map_err(|_| Error::tool_not_found(name))
}
