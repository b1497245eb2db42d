//! Candidate eligibility.
//!
//! [`PathFilter`] is a pure predicate over configuration and entry metadata.
//! Excluded paths are resolved once at construction, so every check is a
//! component-wise prefix comparison without touching the filesystem.

use super::path_utils::{is_within, normalize_path, resolve_path};
use super::FileCandidate;
use std::path::{Path, PathBuf};

/// Configuration for [`PathFilter`].
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Roots being scanned. Candidates outside every root are rejected.
    pub included_roots: Vec<PathBuf>,
    /// Directories (or files) whose subtree is never scanned.
    pub excluded_paths: Vec<PathBuf>,
    /// Files smaller than this are rejected.
    pub minimum_file_size: u64,
    /// Whether a symlink resolving to a regular file may become a candidate.
    pub include_symlinked_files: bool,
}

impl FilterConfig {
    /// Create a configuration for the given roots with no other limits.
    #[must_use]
    pub fn new(included_roots: Vec<PathBuf>) -> Self {
        Self {
            included_roots,
            ..Self::default()
        }
    }

    /// Set the excluded paths.
    #[must_use]
    pub fn with_excluded_paths(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded_paths = excluded;
        self
    }

    /// Set the minimum file size in bytes.
    #[must_use]
    pub fn with_minimum_file_size(mut self, bytes: u64) -> Self {
        self.minimum_file_size = bytes;
        self
    }

    /// Allow symlinks that resolve to regular files.
    #[must_use]
    pub fn with_symlinked_files(mut self, include: bool) -> Self {
        self.include_symlinked_files = include;
        self
    }
}

/// Decides whether an entry takes part in duplicate analysis.
#[derive(Debug, Clone)]
pub struct PathFilter {
    included_roots: Vec<PathBuf>,
    excluded_paths: Vec<PathBuf>,
    minimum_file_size: u64,
    include_symlinked_files: bool,
}

impl PathFilter {
    /// Build a filter, resolving roots and exclusions.
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        let included_roots = config
            .included_roots
            .iter()
            .map(|p| resolve_path(p))
            .collect();
        let excluded_paths = config
            .excluded_paths
            .iter()
            .map(|p| resolve_path(p))
            .collect();

        Self {
            included_roots,
            excluded_paths,
            minimum_file_size: config.minimum_file_size,
            include_symlinked_files: config.include_symlinked_files,
        }
    }

    /// Whether `candidate` is eligible.
    ///
    /// Rejects zero-byte files, files below the minimum size, paths under an
    /// excluded prefix and paths outside every included root.
    #[must_use]
    pub fn eligible(&self, candidate: &FileCandidate) -> bool {
        if candidate.size == 0 || candidate.size < self.minimum_file_size {
            return false;
        }
        let path = normalize_path(&candidate.path);
        self.in_roots(&path) && !self.is_excluded(&path)
    }

    /// Whether the subtree at `dir` should be skipped entirely.
    #[must_use]
    pub fn excludes_dir(&self, dir: &Path) -> bool {
        self.is_excluded(&normalize_path(dir))
    }

    /// Whether symlinks resolving to regular files may become candidates.
    #[must_use]
    pub fn includes_symlinked_files(&self) -> bool {
        self.include_symlinked_files
    }

    /// Minimum eligible size in bytes.
    #[must_use]
    pub fn minimum_file_size(&self) -> u64 {
        self.minimum_file_size
    }

    fn is_excluded(&self, normalized: &Path) -> bool {
        self.excluded_paths.iter().any(|ex| is_within(normalized, ex))
    }

    fn in_roots(&self, normalized: &Path) -> bool {
        self.included_roots.is_empty()
            || self.included_roots.iter().any(|root| is_within(normalized, root))
    }
}
