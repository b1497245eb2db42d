//! Error taxonomy, per-path soft errors, and process exit codes.
//!
//! Scanning and deletion never abort on a single bad path. Instead the
//! failure is classified into an [`ErrorKind`] and collected as a
//! [`PathError`] next to the results. Only session-level failures (missing
//! roots, worker pool construction) are fatal; those live in
//! [`crate::duplicates::FinderError`] and [`crate::session::SessionError`].

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Classification of every error the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Permission or I/O failure while walking or hashing. Soft.
    PathUnreadable,
    /// A scan root does not exist. Fatal at scan start.
    RootNotFound,
    /// The entry disappeared between discovery and hash/delete. Soft.
    FileVanished,
    /// Deletion refused by the filesystem (permissions, file in use).
    DeletionDenied,
    /// Deleting the selection would leave a group with no surviving copy,
    /// or the path is not part of any group.
    InvariantViolation,
    /// The file was modified after it was fingerprinted.
    ContentChanged,
}

impl ErrorKind {
    /// Classify an I/O error raised while reading (walk or hash).
    #[must_use]
    pub fn from_read_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileVanished,
            _ => Self::PathUnreadable,
        }
    }

    /// Classify an I/O error raised while deleting.
    #[must_use]
    pub fn from_delete_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileVanished,
            _ => Self::DeletionDenied,
        }
    }

    /// Whether this kind is recorded and skipped rather than aborting the scan.
    #[must_use]
    pub fn is_soft(self) -> bool {
        !matches!(self, Self::RootNotFound)
    }

    /// Short machine-readable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathUnreadable => "path_unreadable",
            Self::RootNotFound => "root_not_found",
            Self::FileVanished => "file_vanished",
            Self::DeletionDenied => "deletion_denied",
            Self::InvariantViolation => "invariant_violation",
            Self::ContentChanged => "content_changed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A soft error attached to a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} at {}: {message}", .path.display())]
pub struct PathError {
    /// The path that could not be processed.
    pub path: PathBuf,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Underlying error message.
    pub message: String,
}

impl PathError {
    /// Create a new path error.
    pub fn new(path: impl Into<PathBuf>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    /// Build a soft read error from an I/O failure.
    #[must_use]
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        Self::new(path, ErrorKind::from_read_error(err), err.to_string())
    }
}

/// Exit codes for the `reclaim` binary.
///
/// - 0: duplicates found
/// - 1: general error
/// - 2: scan completed without duplicates
/// - 3: completed with soft errors or failed deletions
/// - 130: interrupted (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Scan completed and duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Scan completed but some paths could not be processed.
    PartialSuccess = 3,
    /// Scan was cancelled.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RC000",
            Self::GeneralError => "RC001",
            Self::NoDuplicates => "RC002",
            Self::PartialSuccess => "RC003",
            Self::Interrupted => "RC130",
        }
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "RC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
