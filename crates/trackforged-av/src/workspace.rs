//! Scratch space for one track's intermediate files.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Workspace for a single download.
///
/// Intermediate files live in a hidden temp directory created next to the
/// final destination, so finalizing is a same-filesystem rename. Dropping the
/// workspace without finalizing discards everything.
///
/// # Example
///
/// ```no_run
/// use trackforged_av::Workspace;
///
/// let workspace = Workspace::new("/music/Artist - Title.m4a")?;
/// let source = workspace.temp_file("source.mp4");
/// // ... write `source`, remux into `workspace.output()` ...
/// workspace.finalize()?;
/// # Ok::<(), trackforged_av::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    output_path: PathBuf,
    destination: PathBuf,
}

impl Workspace {
    /// Create a new workspace that will eventually produce `destination`.
    pub fn new<P: AsRef<Path>>(destination: P) -> Result<Self> {
        let destination = destination.as_ref();
        let file_name = destination
            .file_name()
            .ok_or_else(|| Error::InvalidInput("Invalid destination file path".to_string()))?;

        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let temp_dir = tempfile::Builder::new()
            .prefix(".trackforged-")
            .tempdir_in(&parent)
            .map_err(|e| Error::Workspace(e.to_string()))?;
        let output_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            output_path,
            destination: destination.to_path_buf(),
        })
    }

    /// Where the finished file should be written before finalizing.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// The path `finalize` moves the output to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a temp file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Move the output to the destination, replacing any existing file.
    ///
    /// An existing destination is kept as a `.bak` until the move succeeds
    /// and restored if it fails.
    pub fn finalize(self) -> Result<PathBuf> {
        let dest = &self.destination;

        if !self.output_path.exists() {
            return Err(Error::Workspace(format!(
                "Output file does not exist: {:?}",
                self.output_path
            )));
        }

        if dest.exists() {
            let backup = dest.with_extension("bak");
            std::fs::rename(dest, &backup).map_err(|e| {
                Error::Workspace(format!("Failed to create backup of existing file: {}", e))
            })?;

            if let Err(e) = std::fs::rename(&self.output_path, dest) {
                let _ = std::fs::rename(&backup, dest);
                return Err(Error::Workspace(format!(
                    "Failed to move output to destination: {}",
                    e
                )));
            }

            let _ = std::fs::remove_file(&backup);
        } else {
            std::fs::rename(&self.output_path, dest).map_err(|e| {
                Error::Workspace(format!("Failed to move output to destination: {}", e))
            })?;
        }

        Ok(dest.clone())
    }
}
