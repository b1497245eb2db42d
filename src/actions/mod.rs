//! File actions on scan results.
//!
//! # Deletion
//!
//! The delete module removes a caller-selected subset of duplicates:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (requires explicit configuration)
//! - Validation that every group keeps at least one copy
//! - TOCTOU verification to detect modified files
//!
//! # Preview
//!
//! The preview module reports name, size and timestamps for a single file.
//!
//! ```no_run
//! use reclaim::actions::preview::FileInfo;
//! use std::path::Path;
//!
//! let info = FileInfo::inspect(Path::new("example.txt")).unwrap();
//! println!("{} ({})", info.name, info.formatted_size);
//! ```

pub mod delete;
pub mod preview;

pub use delete::{DeleteConfig, DeleteError, DeleteFailure, Deleter, DeletionOutcome};
pub use preview::{FileInfo, PreviewError};
