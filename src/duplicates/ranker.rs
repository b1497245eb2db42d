//! Group ordering and keep suggestions.
//!
//! Ranking reorders groups only. Members keep their discovery order and are
//! never removed; a keep policy merely annotates which member a caller might
//! want to retain.

use super::groups::DuplicateGroup;
use crate::scanner::path_utils::depth;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which member of a group to suggest keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// Oldest modification time.
    #[default]
    Oldest,
    /// Newest modification time.
    Newest,
    /// Most deeply nested path.
    DeepestPath,
    /// Least deeply nested path.
    ShallowestPath,
}

/// A group with an optional suggested-keep member index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedGroup {
    /// The unmodified group
    pub group: DuplicateGroup,
    /// Index into `group.members` of the suggested survivor
    pub suggested_keep: Option<usize>,
}

impl RankedGroup {
    /// Paths other than the suggested survivor, in discovery order.
    ///
    /// Empty when no suggestion was made.
    pub fn removal_candidates(&self) -> Vec<&std::path::Path> {
        match self.suggested_keep {
            Some(keep) => self
                .group
                .members
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != keep)
                .map(|(_, m)| m.path.as_path())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Order groups by total size descending, then member count descending,
/// then digest ascending.
#[must_use]
pub fn rank(mut groups: Vec<DuplicateGroup>) -> Vec<DuplicateGroup> {
    groups.sort_by(compare_groups);
    groups
}

fn compare_groups(a: &DuplicateGroup, b: &DuplicateGroup) -> Ordering {
    b.total_size()
        .cmp(&a.total_size())
        .then_with(|| b.len().cmp(&a.len()))
        .then_with(|| a.digest.cmp(&b.digest))
}

/// Index of the member `policy` would keep. Ties go to the earliest
/// discovered member. `None` for an empty group.
#[must_use]
pub fn suggest_keep(group: &DuplicateGroup, policy: KeepPolicy) -> Option<usize> {
    let members = group.members.iter().enumerate();
    // min_by/max_by keep the first/last of equal elements respectively, so
    // max-style policies compare reversed and use min_by to prefer early members.
    match policy {
        KeepPolicy::Oldest => members.min_by(|(_, a), (_, b)| a.modified.cmp(&b.modified)),
        KeepPolicy::Newest => members.min_by(|(_, a), (_, b)| b.modified.cmp(&a.modified)),
        KeepPolicy::DeepestPath => {
            members.min_by(|(_, a), (_, b)| depth(&b.path).cmp(&depth(&a.path)))
        }
        KeepPolicy::ShallowestPath => {
            members.min_by(|(_, a), (_, b)| depth(&a.path).cmp(&depth(&b.path)))
        }
    }
    .map(|(i, _)| i)
}

/// Rank groups and annotate each with a keep suggestion.
#[must_use]
pub fn rank_with_keep(groups: Vec<DuplicateGroup>, policy: Option<KeepPolicy>) -> Vec<RankedGroup> {
    rank(groups)
        .into_iter()
        .map(|group| {
            let suggested_keep = policy.and_then(|p| suggest_keep(&group, p));
            RankedGroup {
                group,
                suggested_keep,
            }
        })
        .collect()
}
