//! Utility functions and helpers

use crate::error::{ExportError, Result};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

/// File system utilities
pub struct FileUtils;

impl FileUtils {
    /// Expand tilde (~) in file paths
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(rest) = path.strip_prefix('~') {
            let home_dir = dirs::home_dir()
                .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
            let rest = rest.trim_start_matches(['/', '\\']);
            Ok(home_dir.join(rest))
        } else {
            Ok(PathBuf::from(path))
        }
    }

    /// Whether a profile argument names a path rather than a profile directory
    pub fn is_path_like(value: &str) -> bool {
        value.contains('/') || value.contains('\\') || value.starts_with('~')
    }

    /// Recursively collect files named `filename` under `root`.
    ///
    /// Symlinked directories are not followed. Unreadable directories are
    /// skipped; profile trees routinely contain cache folders the current
    /// user cannot list.
    pub fn find_files(root: &Path, filename: &str) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::debug!("Skipping unreadable entry under {:?}: {}", root, err);
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| entry.file_name().to_str() == Some(filename))
            .map(DirEntry::into_path)
            .collect()
    }

    /// Pick the most recently modified path
    pub fn newest_path(paths: Vec<PathBuf>) -> Option<PathBuf> {
        paths
            .into_iter()
            .filter_map(|path| {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((modified, path))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }
}

/// Private copy of a browser database, removed on drop.
///
/// Browsers keep their stores open and locked while running; reading a copy
/// avoids contending for that lock.
pub struct DatabaseSnapshot {
    _dir: TempDir,
    path: PathBuf,
}

impl DatabaseSnapshot {
    pub fn copy(source: &Path, file_name: &str) -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to create temp dir: {}", e))
        })?;
        let path = dir.path().join(file_name);
        fs::copy(source, &path).map_err(|e| {
            crate::browser::map_cookie_io_error(
                "Failed to copy cookies DB",
                source,
                e,
                Some("Close the browser and try again."),
            )
        })?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .map_err(|e| ExportError::BrowserCookie(format!("Failed to open cookies DB: {}", e)))
    }
}
