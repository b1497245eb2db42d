//! File discovery and content fingerprinting.
//!
//! - [`filter`]: eligibility predicate (exclusions, minimum size, zero-byte files)
//! - [`walker`]: lazy, cancellable traversal of one or more roots using jwalk
//! - [`hasher`]: BLAKE3 fingerprints in escalating phases
//! - [`hardlink`]: (device, inode) identity tracking
//! - [`path_utils`]: NFC and symlink-resolved path comparison
//!
//! # Example
//!
//! ```no_run
//! use reclaim::scanner::{FilterConfig, PathFilter, Walker};
//! use reclaim::signal::CancelToken;
//! use std::path::PathBuf;
//!
//! let roots = vec![PathBuf::from(".")];
//! let filter = PathFilter::new(FilterConfig::new(roots.clone()).with_minimum_file_size(1024));
//! let walker = Walker::new(roots, filter, CancelToken::new()).unwrap();
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod filter;
pub mod hardlink;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use serde::Serialize;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub use filter::{FilterConfig, PathFilter};
pub use hardlink::HardlinkTracker;
pub use hasher::{hash_to_hex, hex_to_hash, Fingerprint, Fingerprinter, Hash, HashError, Phase};
pub use walker::{Walker, WalkerError};

/// Filesystem identity of an entry.
///
/// Hard links and bind mounts alias the same data under different paths, so
/// identity is the (device, inode) pair rather than the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceInode {
    /// Device id of the containing filesystem
    pub device: u64,
    /// Inode number on that device
    pub inode: u64,
}

impl DeviceInode {
    /// Extract the identity from file metadata.
    ///
    /// Returns `None` on platforms without stable inode numbers.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    /// Extract the identity from file metadata.
    ///
    /// Returns `None` on platforms without stable inode numbers.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// A regular file eligible for duplicate analysis.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCandidate {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Filesystem identity, when the platform provides one
    pub device_inode: Option<DeviceInode>,
    /// Reached through a symlink; size, mtime and identity are the target's
    pub is_symlink: bool,
}

impl FileCandidate {
    /// Create a candidate without filesystem identity.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            device_inode: None,
            is_symlink: false,
        }
    }

    /// Build a candidate from a path and its (already fetched) metadata.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        Self {
            path,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            device_inode: DeviceInode::from_metadata(metadata),
            is_symlink: false,
        }
    }

    /// Mark as discovered through a symlink.
    #[must_use]
    pub fn as_symlink(mut self) -> Self {
        self.is_symlink = true;
        self
    }

    /// Attach a filesystem identity.
    #[must_use]
    pub fn with_device_inode(mut self, id: DeviceInode) -> Self {
        self.device_inode = Some(id);
        self
    }
}
