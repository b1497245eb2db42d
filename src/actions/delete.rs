//! Deletion of caller-selected duplicates.
//!
//! # Overview
//!
//! [`Deleter::delete`] removes a subset of the members of scanned duplicate
//! groups while guaranteeing that every group keeps at least one copy:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (explicit configuration)
//! - TOCTOU re-check of size and mtime before each removal
//! - Optional byte-for-byte comparison against a surviving copy
//!
//! # Safety
//!
//! Validation runs before any file is touched. A selection that covers every
//! member of a group is refused for that group's members as a whole, and a
//! path that belongs to no group is refused outright. Each group also needs
//! an unselected member that is still on disk with its scanned size and
//! mtime; groups are snapshots, so earlier batches may already have removed
//! some of their members. Remaining paths are deleted independently; one
//! failure never stops the others.
//!
//! Removing a symlinked member frees no space, so it adds nothing to
//! `reclaimed_bytes`.
//!
//! # Example
//!
//! ```no_run
//! use reclaim::actions::delete::{DeleteConfig, Deleter};
//! # let groups: Vec<reclaim::duplicates::DuplicateGroup> = Vec::new();
//! use std::path::PathBuf;
//!
//! let deleter = Deleter::new(DeleteConfig::default());
//! let outcome = deleter.delete(&[PathBuf::from("/photos/copy.jpg")], &groups);
//! println!("{}", outcome.summary());
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::ScanConfig;
use crate::duplicates::DuplicateGroup;
use crate::error::ErrorKind;
use crate::scanner::FileCandidate;

const COMPARE_CHUNK: usize = 64 * 1024;

/// Error type for a single path's deletion.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (already deleted or moved).
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path is not a member of any scanned group.
    #[error("not part of any duplicate group: {}", .0.display())]
    NotInGroup(PathBuf),

    /// Every member of the group was selected.
    #[error("cannot delete every copy in group {digest}: {}", .path.display())]
    AllCopiesWouldBeDeleted {
        /// Selected path
        path: PathBuf,
        /// Hex digest of the group
        digest: String,
    },

    /// No unselected member of the group is still intact on disk.
    #[error("no intact copy of group {digest} would remain: {}", .path.display())]
    NoSurvivingCopy {
        /// Selected path
        path: PathBuf,
        /// Hex digest of the group
        digest: String,
    },

    /// File was modified since scan (TOCTOU protection).
    #[error("file changed since scan: {}: {reason}", .path.display())]
    Changed {
        /// Changed path
        path: PathBuf,
        /// What differed
        reason: String,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {}: {message}", .path.display())]
    TrashFailed {
        /// Path that could not be trashed
        path: PathBuf,
        /// Platform message
        message: String,
    },

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

impl DeleteError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Taxonomy classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::FileVanished,
            Self::NotInGroup(_)
            | Self::AllCopiesWouldBeDeleted { .. }
            | Self::NoSurvivingCopy { .. } => ErrorKind::InvariantViolation,
            Self::Changed { .. } => ErrorKind::ContentChanged,
            Self::TrashFailed { .. } => ErrorKind::DeletionDenied,
            Self::Io { source, .. } => ErrorKind::from_delete_error(source),
        }
    }
}

/// Recorded failure for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// Classification
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl From<&DeleteError> for DeleteFailure {
    fn from(err: &DeleteError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one [`Deleter::delete`] batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionOutcome {
    /// Paths removed, in selection order.
    pub deleted_paths: Vec<PathBuf>,
    /// Paths not removed, with the reason.
    pub failed_paths: BTreeMap<PathBuf, DeleteFailure>,
    /// Sum of the sizes of `deleted_paths`.
    pub reclaimed_bytes: u64,
}

impl DeletionOutcome {
    /// Whether every selected path was removed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_paths.is_empty()
    }

    /// Failure kind per path.
    #[must_use]
    pub fn failed_kinds(&self) -> BTreeMap<&Path, ErrorKind> {
        self.failed_paths
            .iter()
            .map(|(path, failure)| (path.as_path(), failure.kind))
            .collect()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!(
                "Deleted {} file(s), freed {}",
                self.deleted_paths.len(),
                ByteSize(self.reclaimed_bytes)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.deleted_paths.len(),
                self.failed_paths.len(),
                ByteSize(self.reclaimed_bytes)
            )
        }
    }

    fn record_failure(&mut self, path: PathBuf, err: &DeleteError) {
        log::warn!("{}", err);
        self.failed_paths.insert(path, DeleteFailure::from(err));
    }
}

/// Configuration for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Move to the platform trash instead of unlinking.
    pub use_trash: bool,
    /// Refuse files whose size or mtime differ from the scan.
    pub verify_unchanged: bool,
    /// Compare bytes against a surviving member before deleting.
    pub verify_content: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            use_trash: true,
            verify_unchanged: true,
            verify_content: false,
        }
    }
}

impl DeleteConfig {
    /// Config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            use_trash: false,
            ..Self::default()
        }
    }

    /// Enable/disable the size and mtime re-check.
    #[must_use]
    pub fn with_verify_unchanged(mut self, verify: bool) -> Self {
        self.verify_unchanged = verify;
        self
    }

    /// Enable/disable byte comparison against a survivor.
    #[must_use]
    pub fn with_verify_content(mut self, verify: bool) -> Self {
        self.verify_content = verify;
        self
    }
}

impl From<&ScanConfig> for DeleteConfig {
    fn from(config: &ScanConfig) -> Self {
        Self {
            use_trash: config.use_trash,
            verify_unchanged: config.verify_unchanged,
            verify_content: config.verify_before_delete,
        }
    }
}

/// A validated deletion: the member to remove and a copy that stays.
struct Planned<'a> {
    member: &'a FileCandidate,
    survivor: &'a FileCandidate,
}

/// Removes selected group members.
///
/// Holds no state between calls, so `delete` may be invoked again as soon as
/// the previous call returns.
#[derive(Debug, Clone, Default)]
pub struct Deleter {
    config: DeleteConfig,
}

impl Deleter {
    /// Create a deleter.
    #[must_use]
    pub fn new(config: DeleteConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> DeleteConfig {
        self.config
    }

    /// Delete `selected` paths, each of which must be a member of one of `groups`.
    #[must_use]
    pub fn delete(&self, selected: &[PathBuf], groups: &[DuplicateGroup]) -> DeletionOutcome {
        let mut outcome = DeletionOutcome::default();
        let plan = Self::validate(selected, groups, &mut outcome);
        log::info!(
            "Deleting {} file(s) ({} rejected by validation, {})",
            plan.len(),
            outcome.failed_paths.len(),
            if self.config.use_trash { "trash" } else { "permanent" }
        );

        let results: Vec<(&Planned<'_>, Result<u64, DeleteError>)> = plan
            .par_iter()
            .map(|planned| (planned, self.delete_one(planned)))
            .collect();

        for (planned, result) in results {
            let path = planned.member.path.clone();
            match result {
                Ok(size) => {
                    outcome.reclaimed_bytes += size;
                    outcome.deleted_paths.push(path);
                }
                Err(err) => outcome.record_failure(path, &err),
            }
        }

        log::info!("{}", outcome.summary());
        outcome
    }

    /// Match selections to groups and reject those that would empty a group.
    fn validate<'a>(
        selected: &[PathBuf],
        groups: &'a [DuplicateGroup],
        outcome: &mut DeletionOutcome,
    ) -> Vec<Planned<'a>> {
        let mut seen = BTreeSet::new();
        let unique: Vec<&PathBuf> = selected.iter().filter(|p| seen.insert(*p)).collect();

        let mut owner: HashMap<&Path, (usize, usize)> = HashMap::new();
        for (g, group) in groups.iter().enumerate() {
            for (m, member) in group.members.iter().enumerate() {
                owner.entry(member.path.as_path()).or_insert((g, m));
            }
        }

        let mut by_group: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut order: Vec<(usize, usize)> = Vec::with_capacity(unique.len());
        for path in unique {
            match owner.get(path.as_path()) {
                Some(&(g, m)) => {
                    by_group.entry(g).or_default().push(m);
                    order.push((g, m));
                }
                None => outcome.record_failure(path.clone(), &DeleteError::NotInGroup(path.clone())),
            }
        }

        let mut survivors: HashMap<usize, usize> = HashMap::new();
        for (&g, chosen) in &by_group {
            let group = &groups[g];
            let unselected: Vec<usize> = (0..group.len()).filter(|m| !chosen.contains(m)).collect();
            let survivor = unselected
                .iter()
                .copied()
                .find(|&m| still_intact(&group.members[m]));

            if let Some(s) = survivor {
                survivors.insert(g, s);
                continue;
            }
            for &m in chosen {
                let path = group.members[m].path.clone();
                let digest = group.digest_hex();
                let err = if unselected.is_empty() {
                    DeleteError::AllCopiesWouldBeDeleted {
                        path: path.clone(),
                        digest,
                    }
                } else {
                    DeleteError::NoSurvivingCopy {
                        path: path.clone(),
                        digest,
                    }
                };
                outcome.record_failure(path, &err);
            }
        }

        order
            .into_iter()
            .filter_map(|(g, m)| {
                survivors.get(&g).map(|&s| Planned {
                    member: &groups[g].members[m],
                    survivor: &groups[g].members[s],
                })
            })
            .collect()
    }

    fn delete_one(&self, planned: &Planned<'_>) -> Result<u64, DeleteError> {
        let member = planned.member;
        let path = member.path.as_path();
        // A symlinked member was scanned through its target.
        let metadata = if member.is_symlink {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
        .map_err(|e| DeleteError::from_io(path, e))?;

        if self.config.verify_unchanged {
            verify_unchanged(member, &metadata)?;
        }
        if self.config.verify_content {
            verify_same_content(path, &planned.survivor.path)?;
        }

        if self.config.use_trash {
            trash::delete(path).map_err(|e| DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            log::info!("Moved to trash: {} ({} bytes)", path.display(), member.size);
        } else {
            fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))?;
            log::info!("Permanently deleted: {} ({} bytes)", path.display(), member.size);
        }
        Ok(if member.is_symlink { 0 } else { member.size })
    }
}

/// Whether `member` is still on disk as scanned.
fn still_intact(member: &FileCandidate) -> bool {
    let intact = match fs::metadata(&member.path) {
        Ok(metadata) => {
            metadata.is_file()
                && metadata.len() == member.size
                && metadata.modified().map_or(true, |t| t == member.modified)
        }
        Err(_) => false,
    };
    if !intact {
        log::debug!("Not usable as surviving copy: {}", member.path.display());
    }
    intact
}

fn verify_unchanged(member: &FileCandidate, metadata: &fs::Metadata) -> Result<(), DeleteError> {
    if metadata.len() != member.size {
        return Err(DeleteError::Changed {
            path: member.path.clone(),
            reason: format!("size changed from {} to {}", member.size, metadata.len()),
        });
    }
    if let Ok(modified) = metadata.modified() {
        if modified != member.modified {
            return Err(DeleteError::Changed {
                path: member.path.clone(),
                reason: "modification time changed".to_string(),
            });
        }
    }
    Ok(())
}

/// Byte-for-byte comparison of `path` against `survivor`.
fn verify_same_content(path: &Path, survivor: &Path) -> Result<(), DeleteError> {
    let mismatch = |reason: String| DeleteError::Changed {
        path: path.to_path_buf(),
        reason,
    };
    let mut a = File::open(path).map_err(|e| DeleteError::from_io(path, e))?;
    let mut b = File::open(survivor)
        .map_err(|e| mismatch(format!("cannot verify against {}: {e}", survivor.display())))?;

    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];
    loop {
        let n = read_full(&mut a, &mut buf_a).map_err(|e| DeleteError::from_io(path, e))?;
        let m = read_full(&mut b, &mut buf_b)
            .map_err(|e| mismatch(format!("cannot verify against {}: {e}", survivor.display())))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Err(mismatch(format!(
                "content differs from {}",
                survivor.display()
            )));
        }
        if n == 0 {
            return Ok(());
        }
    }
}

/// Fill `buf` as far as possible; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
