//! Size buckets and confirmed duplicate groups.
//!
//! Size bucketing is the first and cheapest phase: files of different sizes
//! cannot be identical, and a size shared by no other file is dropped
//! without ever opening the file.
//!
//! Buckets hold indices into the discovery-ordered candidate list rather
//! than the candidates themselves, so every later phase preserves discovery
//! order by keeping indices sorted.
//!
//! ```
//! use reclaim::scanner::FileCandidate;
//! use reclaim::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileCandidate::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileCandidate::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
//!     FileCandidate::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
//! ];
//!
//! let (buckets, stats) = group_by_size(&files);
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(buckets[0].members, vec![0, 1]);
//! ```

use bytesize::ByteSize;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;

use crate::scanner::{hash_to_hex, FileCandidate, Hash};

/// Candidates sharing one exact size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// Shared size in bytes
    pub size: u64,
    /// Indices into the candidate list, ascending (discovery order)
    pub members: Vec<usize>,
}

impl SizeBucket {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the bucket has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Statistics from size bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Candidates considered
    pub total_files: usize,
    /// Sum of their sizes
    pub total_size: u64,
    /// Distinct sizes seen
    pub unique_sizes: usize,
    /// Candidates dropped because no other file shares their size
    pub eliminated_unique: usize,
    /// Candidates left in buckets of two or more
    pub potential_duplicates: usize,
    /// Number of such buckets
    pub buckets: usize,
}

impl GroupingStats {
    /// Percentage of candidates eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.eliminated_unique as f64 / self.total_files as f64 * 100.0
        }
    }
}

/// Bucket candidates by exact size, dropping singleton sizes.
///
/// Buckets are returned largest size first so the most valuable groups
/// resolve early. Zero-byte candidates never form a bucket.
#[must_use]
pub fn group_by_size(candidates: &[FileCandidate]) -> (Vec<SizeBucket>, GroupingStats) {
    let mut by_size: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut stats = GroupingStats::default();

    for (index, candidate) in candidates.iter().enumerate() {
        stats.total_files += 1;
        stats.total_size += candidate.size;
        if candidate.size == 0 {
            stats.eliminated_unique += 1;
            continue;
        }
        by_size.entry(candidate.size).or_default().push(index);
    }
    stats.unique_sizes = by_size.len();

    let mut buckets: Vec<SizeBucket> = by_size
        .into_iter()
        .filter_map(|(size, members)| {
            if members.len() < 2 {
                stats.eliminated_unique += members.len();
                log::trace!("Eliminated unique size {}", size);
                return None;
            }
            stats.potential_duplicates += members.len();
            stats.buckets += 1;
            Some(SizeBucket { size, members })
        })
        .collect();

    buckets.sort_by(|a, b| b.size.cmp(&a.size));

    log::info!(
        "Phase 1 complete: {} files -> {} potential duplicates in {} size buckets ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.buckets,
        stats.elimination_rate()
    );

    (buckets, stats)
}

fn serialize_digest<S: Serializer>(digest: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hash_to_hex(digest))
}

/// Files with byte-identical content.
///
/// All members share `size` and the full-content `digest`, and there are
/// always at least two of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// BLAKE3 digest of the full content
    #[serde(serialize_with = "serialize_digest")]
    pub digest: Hash,
    /// Size of each member in bytes
    pub size: u64,
    /// Members in discovery order
    pub members: Vec<FileCandidate>,
}

impl DuplicateGroup {
    /// Create a group.
    #[must_use]
    pub fn new(digest: Hash, size: u64, members: Vec<FileCandidate>) -> Self {
        debug_assert!(members.len() >= 2, "duplicate group needs two members");
        debug_assert!(members.iter().all(|m| m.size == size));
        Self {
            digest,
            size,
            members,
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members. Never true for a surfaced group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `size × count`.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.members.len() as u64
    }

    /// Bytes freed by removing all but one member: `size × (count − 1)`.
    #[must_use]
    pub fn reclaimable_size(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }

    /// Hex form of the digest.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hash_to_hex(&self.digest)
    }

    /// Member paths in discovery order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.members.iter().map(|m| m.path.as_path())
    }

    /// Whether `path` is a member.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.members.iter().any(|m| m.path == path)
    }

    /// Lower-cased extension of the first member, if it has one.
    #[must_use]
    pub fn file_extension(&self) -> Option<String> {
        self.members
            .first()
            .and_then(|m| m.path.extension())
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Human-readable total size.
    #[must_use]
    pub fn formatted_total_size(&self) -> String {
        ByteSize(self.total_size()).to_string()
    }

    /// Human-readable reclaimable size.
    #[must_use]
    pub fn formatted_reclaimable_size(&self) -> String {
        ByteSize(self.reclaimable_size()).to_string()
    }
}
