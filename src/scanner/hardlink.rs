//! (device, inode) identity tracking.
//!
//! Used twice during a walk:
//!
//! - for directories, so a bind mount that loops back into the tree is not
//!   descended a second time;
//! - for files, so a second hard link to data already discovered is skipped.
//!   Hard links share one copy on disk and deleting one reclaims nothing.
//!
//! The tracker is shared between jwalk's worker threads, so it takes `&self`
//! and locks internally.

use super::DeviceInode;
use std::collections::HashSet;
use std::sync::Mutex;

/// Remembers which (device, inode) pairs have been seen.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: Mutex<HashSet<DeviceInode>>,
}

impl HardlinkTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` and report whether this is its first sighting.
    pub fn first_sighting(&self, id: DeviceInode) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(id),
            Err(poisoned) => poisoned.into_inner().insert(id),
        }
    }
}
