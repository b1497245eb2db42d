//! File metadata for callers that show a preview of a duplicate.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while inspecting a file.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// File was not found.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path is not a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// Any other I/O error.
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        /// Affected path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl PreviewError {
    /// Taxonomy classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::FileVanished,
            Self::NotAFile(_) | Self::Io { .. } => ErrorKind::PathUnreadable,
        }
    }
}

/// Summary of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Full path
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Lower-cased extension, if any
    pub extension: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Size as a human-readable string
    pub formatted_size: String,
    /// Last modification time in local time
    pub modified: Option<DateTime<Local>>,
    /// Whether the file is marked read-only
    pub readonly: bool,
}

impl FileInfo {
    /// Read metadata for `path`.
    ///
    /// # Errors
    ///
    /// [`PreviewError`] if the file is missing, unreadable or not a regular file.
    pub fn inspect(path: &Path) -> Result<Self, PreviewError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PreviewError::NotFound(path.to_path_buf()),
            _ => PreviewError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        if !metadata.is_file() {
            return Err(PreviewError::NotAFile(path.to_path_buf()));
        }

        let size = metadata.len();
        Ok(Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase()),
            size,
            formatted_size: ByteSize(size).to_string(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
            readonly: metadata.permissions().readonly(),
        })
    }

    /// Modification time as `YYYY-MM-DD HH:MM`, or `-` when unknown.
    #[must_use]
    pub fn formatted_modified(&self) -> String {
        self.modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
