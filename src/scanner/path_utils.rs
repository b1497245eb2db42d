//! Path normalization used for root handling and exclusion matching.
//!
//! Exclusions are compared as prefixes of normalized, symlink-resolved
//! directory paths. Two spellings of the same directory must therefore
//! compare equal:
//!
//! - macOS stores names decomposed (NFD) while most input is composed (NFC),
//!   so every path is folded to NFC before comparison.
//! - `.` and `..` components are removed lexically.
//! - Existing paths are canonicalized so symlinked directories resolve to
//!   their target.
//!
//! ```
//! use reclaim::scanner::path_utils::{normalize_path, is_within};
//! use std::path::Path;
//!
//! let nfd = Path::new("/data/cafe\u{0301}/./photos");
//! let nfc = Path::new("/data/café");
//! assert!(is_within(&normalize_path(nfd), &normalize_path(nfc)));
//! ```

use std::path::{Component, Path, PathBuf};
use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Fold a path to NFC and drop `.`/`..` components lexically.
///
/// Paths that are not valid UTF-8 keep their original bytes; only the
/// lexical cleanup is applied to them.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let folded = match path.to_str() {
        Some(s) if !is_nfc(s) => PathBuf::from(s.nfc().collect::<String>()),
        _ => path.to_path_buf(),
    };

    let mut out = PathBuf::new();
    for component in folded.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root or a prefix.
                if matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a user-supplied path for comparison.
///
/// Existing paths are canonicalized (following symlinks). Paths that do not
/// exist are made absolute against the current directory and normalized, so
/// that an exclusion for a directory created later still matches.
#[must_use]
pub fn resolve_path(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => normalize_path(&canonical),
        Err(_) => {
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            };
            normalize_path(&absolute)
        }
    }
}

/// Whether `path` equals `prefix` or lies underneath it.
///
/// Comparison is component-wise, so `/data/photos2` is not within
/// `/data/photos`.
#[must_use]
pub fn is_within(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

/// Number of normal components in a path, used for depth comparisons.
#[must_use]
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}
