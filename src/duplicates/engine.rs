//! The three-phase duplicate funnel.
//!
//! 1. Bucket every candidate by size; singleton sizes are dropped unread.
//! 2. Within each bucket, partial-hash every member and re-bucket; singletons
//!    are dropped.
//! 3. Within each surviving sub-bucket, full-hash every member and re-bucket;
//!    every bucket of two or more becomes a [`DuplicateGroup`].
//!
//! Size buckets are independent, so they are resolved in parallel and the
//! members of a bucket are hashed in parallel. Each bucket builds its own
//! digest maps; nothing is shared between buckets except the read counters
//! and the progress tracker, which are atomic.
//!
//! A bucket is all-or-nothing under cancellation: if any read in it was
//! interrupted, none of its groups are reported.

use super::groups::{group_by_size, DuplicateGroup, GroupingStats, SizeBucket};
use crate::error::PathError;
use crate::progress::ProgressTracker;
use crate::scanner::{FileCandidate, Fingerprinter, Hash, HashError, Phase};
use crate::signal::CancelToken;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Cost accounting for one resolution.
///
/// For any input, `full_reads <= partial_reads <= size_compared`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunnelStats {
    /// Candidates compared by size (every eligible candidate)
    pub size_compared: u64,
    /// Files opened for a partial hash
    pub partial_reads: u64,
    /// Files opened for a full hash
    pub full_reads: u64,
    /// Content bytes read across both hash phases
    pub bytes_read: u64,
    /// Candidates dropped because their size was unique
    pub eliminated_by_size: u64,
    /// Candidates dropped because their partial digest was unique
    pub eliminated_by_partial: u64,
    /// Candidates dropped because their full digest was unique
    pub eliminated_by_full: u64,
    /// Candidates dropped because a read failed
    pub failed_reads: u64,
    /// Size buckets fully resolved
    pub buckets_resolved: u64,
    /// Size buckets abandoned because of cancellation
    pub buckets_abandoned: u64,
}

/// Output of [`GroupEngine::resolve`].
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Confirmed groups, ordered by the discovery index of their first member
    pub groups: Vec<DuplicateGroup>,
    /// Soft errors from hashing
    pub errors: Vec<PathError>,
    /// Cost accounting
    pub stats: FunnelStats,
    /// Size bucketing statistics
    pub grouping: GroupingStats,
    /// Whether cancellation cut resolution short
    pub interrupted: bool,
}

#[derive(Default)]
struct BucketOutcome {
    groups: Vec<(usize, DuplicateGroup)>,
    errors: Vec<PathError>,
    eliminated_by_partial: u64,
    eliminated_by_full: u64,
    failed_reads: u64,
    interrupted: bool,
}

/// Aggregates fingerprints into duplicate groups.
#[derive(Debug)]
pub struct GroupEngine {
    fingerprinter: Arc<Fingerprinter>,
    cancel: CancelToken,
    progress: Arc<ProgressTracker>,
}

impl GroupEngine {
    /// Create an engine hashing with `fingerprinter`.
    #[must_use]
    pub fn new(fingerprinter: Arc<Fingerprinter>, cancel: CancelToken) -> Self {
        Self {
            fingerprinter,
            cancel,
            progress: Arc::new(ProgressTracker::silent()),
        }
    }

    /// Report hashing progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the funnel over `candidates` (in discovery order).
    ///
    /// Parallel work runs on the current rayon pool; call this inside
    /// `ThreadPool::install` to bound it.
    pub fn resolve(&self, candidates: &[FileCandidate]) -> Resolution {
        let reads_before = self.fingerprinter.read_counts();
        let (buckets, grouping) = group_by_size(candidates);

        // One partial and one full unit per member still in play.
        self.progress
            .begin_hashing(grouping.potential_duplicates as u64 * 2);

        let outcomes: Vec<BucketOutcome> = buckets
            .par_iter()
            .map(|bucket| self.resolve_bucket(candidates, bucket))
            .collect();

        let mut resolution = Resolution {
            grouping,
            ..Resolution::default()
        };
        let mut indexed_groups = Vec::new();
        for outcome in outcomes {
            resolution.errors.extend(outcome.errors);
            resolution.stats.eliminated_by_partial += outcome.eliminated_by_partial;
            resolution.stats.eliminated_by_full += outcome.eliminated_by_full;
            resolution.stats.failed_reads += outcome.failed_reads;
            if outcome.interrupted {
                resolution.interrupted = true;
                resolution.stats.buckets_abandoned += 1;
            } else {
                resolution.stats.buckets_resolved += 1;
                indexed_groups.extend(outcome.groups);
            }
        }
        indexed_groups.sort_by_key(|(first, _)| *first);
        resolution.groups = indexed_groups.into_iter().map(|(_, g)| g).collect();

        let reads_after = self.fingerprinter.read_counts();
        resolution.stats.size_compared = grouping.total_files as u64;
        resolution.stats.eliminated_by_size = grouping.eliminated_unique as u64;
        resolution.stats.partial_reads = reads_after.partial_reads - reads_before.partial_reads;
        resolution.stats.full_reads = reads_after.full_reads - reads_before.full_reads;
        resolution.stats.bytes_read = reads_after.bytes_read - reads_before.bytes_read;

        log::info!(
            "Grouping complete: {} duplicate groups from {} candidates ({} partial reads, {} full reads)",
            resolution.groups.len(),
            resolution.stats.size_compared,
            resolution.stats.partial_reads,
            resolution.stats.full_reads
        );
        if resolution.interrupted {
            log::warn!(
                "Grouping interrupted: {} size buckets abandoned",
                resolution.stats.buckets_abandoned
            );
        }

        resolution
    }

    fn resolve_bucket(&self, candidates: &[FileCandidate], bucket: &SizeBucket) -> BucketOutcome {
        let mut outcome = BucketOutcome::default();
        if self.cancel.is_cancelled() {
            outcome.interrupted = true;
            return outcome;
        }

        // Phase 2: partial hash.
        let partial =
            self.hash_members(candidates, &bucket.members, Phase::PartialHash, &mut outcome);
        if outcome.interrupted {
            return outcome;
        }
        let survivors = collisions(partial);
        let surviving: usize = survivors.iter().map(|(_, m)| m.len()).sum();
        outcome.eliminated_by_partial = (bucket.len() as u64)
            .saturating_sub(surviving as u64 + outcome.failed_reads);
        self.progress
            .drop_units((bucket.len() - surviving) as u64);

        // Phase 3: full hash.
        for (partial_digest, members) in survivors {
            let full = if self.fingerprinter.partial_covers_file(bucket.size) {
                // The window already covered the whole file.
                self.progress.drop_units(members.len() as u64);
                vec![(partial_digest, members)]
            } else {
                let failed_before = outcome.failed_reads;
                let hashed = self.hash_members(candidates, &members, Phase::FullHash, &mut outcome);
                if outcome.interrupted {
                    return outcome;
                }
                let confirmed = collisions(hashed);
                let kept: usize = confirmed.iter().map(|(_, m)| m.len()).sum();
                let failed = outcome.failed_reads - failed_before;
                outcome.eliminated_by_full +=
                    (members.len() as u64).saturating_sub(kept as u64 + failed);
                confirmed
            };

            for (digest, indices) in full {
                let first = indices[0];
                let members = indices.iter().map(|&i| candidates[i].clone()).collect();
                outcome
                    .groups
                    .push((first, DuplicateGroup::new(digest, bucket.size, members)));
            }
        }

        outcome
    }

    /// Hash `members` in parallel at `phase`, returning (index, digest) in input order.
    fn hash_members(
        &self,
        candidates: &[FileCandidate],
        members: &[usize],
        phase: Phase,
        outcome: &mut BucketOutcome,
    ) -> Vec<(usize, Hash)> {
        let results: Vec<(usize, Result<Hash, HashError>)> = members
            .par_iter()
            .map(|&index| {
                let candidate = &candidates[index];
                let result = match phase {
                    Phase::FullHash => self.fingerprinter.full_hash(&candidate.path, candidate.size),
                    _ => self
                        .fingerprinter
                        .partial_hash(&candidate.path, candidate.size),
                };
                if !matches!(result, Err(HashError::Interrupted)) {
                    self.progress.unit_done();
                }
                (index, result)
            })
            .collect();

        let mut hashed = Vec::with_capacity(results.len());
        for (index, result) in results {
            match result {
                Ok(hash) => hashed.push((index, hash)),
                Err(HashError::Interrupted) => outcome.interrupted = true,
                Err(e) => {
                    let path = &candidates[index].path;
                    log::warn!("Skipping {}: {}", path.display(), e);
                    outcome.failed_reads += 1;
                    if let Some(err) = e.to_path_error(path) {
                        outcome.errors.push(err);
                    }
                }
            }
        }
        hashed
    }
}

/// Re-bucket (index, digest) pairs and keep digests shared by two or more.
///
/// Buckets come back ordered by their first member's index, and indices
/// inside a bucket stay ascending.
fn collisions(hashed: Vec<(usize, Hash)>) -> Vec<(Hash, Vec<usize>)> {
    let mut by_digest: HashMap<Hash, Vec<usize>> = HashMap::new();
    for (index, digest) in hashed {
        by_digest.entry(digest).or_default().push(index);
    }
    let mut buckets: Vec<(Hash, Vec<usize>)> = by_digest
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .collect();
    for (_, members) in &mut buckets {
        members.sort_unstable();
    }
    buckets.sort_by_key(|(_, members)| members[0]);
    buckets
}
