//! Duplicate detection.
//!
//! This module provides:
//! - Size bucketing (phase 1)
//! - Partial and full hash resolution per bucket (phases 2 and 3)
//! - Group ranking and keep suggestions
//! - The [`DuplicateFinder`] pipeline tying them to the walker

pub mod engine;
pub mod finder;
pub mod groups;
pub mod ranker;

pub use engine::{FunnelStats, GroupEngine, Resolution};
pub use finder::{DuplicateFinder, FinderError, ScanResult};
pub use groups::{group_by_size, DuplicateGroup, GroupingStats, SizeBucket};
pub use ranker::{rank, rank_with_keep, suggest_keep, KeepPolicy, RankedGroup};
