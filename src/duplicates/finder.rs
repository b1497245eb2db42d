//! The scan pipeline: Walker → Fingerprinter → GroupEngine → Ranker.
//!
//! [`DuplicateFinder::find`] runs synchronously on the calling thread and
//! uses a bounded rayon pool for hashing. [`crate::session::ScanSession`]
//! wraps it in a background thread with start/stop semantics.
//!
//! # Example
//!
//! ```no_run
//! use reclaim::config::ScanConfig;
//! use reclaim::duplicates::DuplicateFinder;
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::new(ScanConfig::default());
//! let result = finder.find(vec![PathBuf::from("/home/user/Downloads")]).unwrap();
//! for group in &result.groups {
//!     println!("{} copies, {} reclaimable", group.len(), group.formatted_reclaimable_size());
//! }
//! ```

use super::engine::{FunnelStats, GroupEngine};
use super::groups::{DuplicateGroup, GroupingStats};
use super::ranker::{rank, rank_with_keep, RankedGroup};
use crate::config::{ConfigError, ScanConfig};
use crate::error::{ErrorKind, PathError};
use crate::progress::ProgressTracker;
use crate::scanner::{FileCandidate, Fingerprinter, PathFilter, Walker, WalkerError};
use crate::signal::CancelToken;
use bytesize::ByteSize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fatal errors that prevent a scan from producing any result.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// A root is missing, not a directory, or unreadable.
    #[error(transparent)]
    Root(#[from] WalkerError),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FinderError {
    /// Taxonomy kind, where one applies.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Root(e) => Some(e.kind()),
            Self::PoolBuild(_) | Self::Config(_) => None,
        }
    }
}

/// Immutable snapshot of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Ranked duplicate groups
    pub groups: Vec<DuplicateGroup>,
    /// Eligible files discovered
    pub scanned_file_count: u64,
    /// Sum of their sizes
    pub scanned_byte_count: u64,
    /// Soft per-path errors from walking and hashing
    pub errors: Vec<PathError>,
    /// Cost accounting of the hashing funnel
    pub funnel: FunnelStats,
    /// Size bucketing statistics
    pub grouping: GroupingStats,
    /// Whether cancellation cut the scan short
    pub interrupted: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

impl ScanResult {
    /// Files belonging to some group.
    #[must_use]
    pub fn duplicate_file_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Bytes freed by keeping exactly one copy per group.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::reclaimable_size).sum()
    }

    /// Whether any soft errors were recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Groups annotated with keep suggestions.
    #[must_use]
    pub fn ranked(&self, policy: Option<super::KeepPolicy>) -> Vec<RankedGroup> {
        rank_with_keep(self.groups.clone(), policy)
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} files ({}) scanned, {} duplicate groups, {} files, {} reclaimable{}",
            self.scanned_file_count,
            ByteSize(self.scanned_byte_count),
            self.groups.len(),
            self.duplicate_file_count(),
            ByteSize(self.reclaimable_bytes()),
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

/// Runs the full detection pipeline.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: ScanConfig,
    cancel: CancelToken,
    progress: Arc<ProgressTracker>,
}

impl DuplicateFinder {
    /// Create a finder with its own cancellation token and no progress output.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            progress: Arc::new(ProgressTracker::silent()),
        }
    }

    /// Observe `token` for cancellation.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `roots` and return ranked duplicate groups.
    ///
    /// Cancellation does not produce an error: the result is returned with
    /// `interrupted` set and contains only fully resolved groups.
    ///
    /// # Errors
    ///
    /// [`FinderError`] for invalid configuration, bad roots or pool failure.
    pub fn find(&self, roots: Vec<PathBuf>) -> Result<ScanResult, FinderError> {
        let start = Instant::now();
        self.config.validate()?;

        let workers = self.config.worker_pool_size;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("reclaim-hash-{i}"))
            .build()?;

        let filter = PathFilter::new(self.config.filter_config(&roots));
        let walker = Walker::new(roots, filter, self.cancel.clone())?.with_threads(workers);
        log::info!(
            "Scanning {} root(s) with {} workers: {:?}",
            walker.roots().len(),
            workers,
            walker.roots().iter().map(|p| p.display()).collect::<Vec<_>>()
        );

        let mut result = ScanResult::default();
        let mut candidates: Vec<FileCandidate> = Vec::new();
        for item in walker.walk() {
            match item {
                Ok(candidate) => {
                    result.scanned_byte_count += candidate.size;
                    candidates.push(candidate);
                    self.progress.file_discovered();
                }
                Err(err) => result.errors.push(err),
            }
        }
        result.scanned_file_count = candidates.len() as u64;
        log::info!(
            "Walk complete: {} candidates ({}), {} errors",
            candidates.len(),
            ByteSize(result.scanned_byte_count),
            result.errors.len()
        );

        if self.cancel.is_cancelled() {
            log::info!("Scan cancelled during walk");
            result.interrupted = true;
            result.duration = start.elapsed();
            return Ok(result);
        }

        let fingerprinter = Arc::new(
            Fingerprinter::new()
                .with_window(self.config.partial_hash_window_bytes)
                .with_chunk_size(self.config.read_chunk_bytes)
                .with_cancel_token(self.cancel.clone()),
        );
        let engine = GroupEngine::new(fingerprinter, self.cancel.clone())
            .with_progress(Arc::clone(&self.progress));
        let resolution = pool.install(|| engine.resolve(&candidates));

        result.groups = rank(resolution.groups);
        result.errors.extend(resolution.errors);
        result.funnel = resolution.stats;
        result.grouping = resolution.grouping;
        result.interrupted = resolution.interrupted || self.cancel.is_cancelled();
        result.duration = start.elapsed();

        if !result.interrupted {
            self.progress.finish();
        }
        log::info!("{} in {:.2?}", result.summary(), result.duration);
        Ok(result)
    }
}
