//! Cancellable multi-root directory traversal using jwalk.
//!
//! # Guarantees
//!
//! - Entries within a directory are sorted by name, so repeated walks of an
//!   unchanged tree yield candidates in the same order.
//! - Symlinks are never followed for recursion. A symlink that resolves to
//!   a regular file becomes a candidate only when the filter allows it.
//! - A directory whose (device, inode) was already visited (a bind mount
//!   looping back into the tree) is not descended again.
//! - A second hard link to already-discovered data is skipped.
//! - Symlinked files are yielded after every regular file, and only when
//!   their target was not itself discovered, so the real file always wins.
//! - Unreadable or vanished entries become soft [`PathError`]s and the walk
//!   continues.
//! - Cancellation is checked every time jwalk lists a directory and before
//!   each yielded entry. Once observed, no further directories are read and
//!   the sequence ends.

use super::filter::PathFilter;
use super::hardlink::HardlinkTracker;
use super::path_utils::{is_within, normalize_path};
use super::{DeviceInode, FileCandidate};
use crate::error::{ErrorKind, PathError};
use crate::signal::CancelToken;
use jwalk::{Parallelism, WalkDir};
use std::fs::{self, Metadata};
use std::io;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Fatal problems with the roots handed to a [`Walker`].
#[derive(thiserror::Error, Debug)]
pub enum WalkerError {
    /// The root does not exist.
    #[error("Root not found: {0}")]
    RootNotFound(PathBuf),

    /// The root exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root could not be resolved.
    #[error("Cannot read root {path}: {source}")]
    RootUnreadable {
        /// Root as supplied
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl WalkerError {
    /// Taxonomy kind for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RootNotFound(_) => ErrorKind::RootNotFound,
            Self::NotADirectory(_) | Self::RootUnreadable { .. } => ErrorKind::PathUnreadable,
        }
    }
}

/// Enumerates eligible regular files under a set of roots.
#[derive(Debug)]
pub struct Walker {
    roots: Vec<PathBuf>,
    filter: Arc<PathFilter>,
    cancel: CancelToken,
    threads: usize,
}

impl Walker {
    /// Validate and normalize `roots`.
    ///
    /// Roots are canonicalized. Repeated roots and roots nested inside
    /// another root are dropped so no subtree is walked twice.
    ///
    /// # Errors
    ///
    /// [`WalkerError::RootNotFound`] for a missing root,
    /// [`WalkerError::NotADirectory`] for a file root.
    pub fn new(
        roots: Vec<PathBuf>,
        filter: PathFilter,
        cancel: CancelToken,
    ) -> Result<Self, WalkerError> {
        Ok(Self {
            roots: resolve_roots(&roots)?,
            filter: Arc::new(filter),
            cancel,
            threads: 1,
        })
    }

    /// Number of threads jwalk may use to read directories.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// The normalized roots that will be walked.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Walk all roots.
    ///
    /// The returned iterator is single-pass. It yields eligible candidates
    /// and soft errors; it ends early once cancellation is observed.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileCandidate, PathError>> + '_ {
        let visited_dirs = Arc::new(HardlinkTracker::new());
        let seen_files = Rc::new(HardlinkTracker::new());
        let deferred_links: Rc<RefCell<Vec<FileCandidate>>> = Rc::default();

        let seen = Rc::clone(&seen_files);
        let links = Rc::clone(&deferred_links);
        let files = self
            .roots
            .iter()
            .take_while(move |_| !self.cancel.is_cancelled())
            .flat_map(move |root| self.walk_root(root, Arc::clone(&visited_dirs)))
            .filter_map(move |item| match item {
                Ok(candidate) if candidate.is_symlink => {
                    links.borrow_mut().push(candidate);
                    None
                }
                Ok(candidate) => first_sighting(&seen, candidate).map(Ok),
                Err(err) => Some(Err(err)),
            });

        let symlinked = std::iter::once(())
            .flat_map(move |()| deferred_links.take())
            .take_while(move |_| !self.cancel.is_cancelled())
            .filter_map(move |candidate| first_sighting(&seen_files, candidate).map(Ok));

        files.chain(symlinked)
    }

    fn walk_root<'a>(
        &'a self,
        root: &'a Path,
        visited_dirs: Arc<HardlinkTracker>,
    ) -> impl Iterator<Item = Result<FileCandidate, PathError>> + 'a {
        let parallelism = if self.threads > 1 {
            Parallelism::RayonNewPool(self.threads)
        } else {
            Parallelism::Serial
        };

        let cancel = self.cancel.clone();
        let filter = Arc::clone(&self.filter);

        let walk_dir = WalkDir::new(root)
            .follow_links(false)
            .skip_hidden(false)
            .parallelism(parallelism)
            .process_read_dir(move |_depth, dir, _read_dir_state, children| {
                if cancel.is_cancelled() {
                    log::debug!("Walker: cancellation observed at {}", dir.display());
                    children.clear();
                    return;
                }

                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });

                children.retain(|child| match child {
                    Ok(entry) if entry.file_type().is_dir() => {
                        let excluded = filter.excludes_dir(&entry.path());
                        if excluded {
                            log::trace!("Excluded directory: {}", entry.path().display());
                        }
                        !excluded
                    }
                    _ => true,
                });

                for entry in children.iter_mut().flatten() {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    let id = fs::symlink_metadata(entry.path())
                        .ok()
                        .and_then(|m| DeviceInode::from_metadata(&m));
                    if let Some(id) = id {
                        if !visited_dirs.first_sighting(id) {
                            log::debug!(
                                "Directory already visited, not descending: {}",
                                entry.path().display()
                            );
                            entry.read_children_path = None;
                        }
                    }
                }
            });

        let cancel = self.cancel.clone();
        walk_dir
            .into_iter()
            .take_while(move |_| !cancel.is_cancelled())
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 {
                        return None;
                    }
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    let path = entry.path();

                    let is_symlink = file_type.is_symlink();
                    let metadata = if is_symlink {
                        if !self.filter.includes_symlinked_files() {
                            log::trace!("Skipping symlink: {}", path.display());
                            return None;
                        }
                        fs::metadata(&path)
                    } else {
                        fs::symlink_metadata(&path)
                    };

                    match metadata {
                        Ok(metadata) => self
                            .process_file(path, &metadata)
                            .map(|c| Ok(if is_symlink { c.as_symlink() } else { c })),
                        Err(e) => Some(Err(handle_io_error(&path, &e))),
                    }
                }
                Err(e) => {
                    let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    let err = match e.io_error() {
                        Some(io_err) => handle_io_error(&path, io_err),
                        None => PathError::new(path, ErrorKind::PathUnreadable, e.to_string()),
                    };
                    Some(Err(err))
                }
            })
    }

    fn process_file(&self, path: PathBuf, metadata: &Metadata) -> Option<FileCandidate> {
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", path.display());
            return None;
        }

        let candidate = FileCandidate::from_metadata(path, metadata);
        if !self.filter.eligible(&candidate) {
            log::trace!(
                "Filtered out ({} bytes): {}",
                candidate.size,
                candidate.path.display()
            );
            return None;
        }
        Some(candidate)
    }
}

/// `None` when the candidate's data was already discovered under another path.
fn first_sighting(seen: &HardlinkTracker, candidate: FileCandidate) -> Option<FileCandidate> {
    match candidate.device_inode {
        Some(id) if !seen.first_sighting(id) => {
            log::debug!("Skipping alias of seen file: {}", candidate.path.display());
            None
        }
        _ => Some(candidate),
    }
}

fn handle_io_error(path: &Path, error: &io::Error) -> PathError {
    let err = PathError::from_io(path, error);
    match err.kind {
        ErrorKind::FileVanished => log::debug!("Vanished during walk: {}", path.display()),
        _ => log::warn!("Cannot read {}: {}", path.display(), error),
    }
    err
}

fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>, WalkerError> {
    let mut resolved = Vec::with_capacity(roots.len());
    for root in roots {
        let canonical = root.canonicalize().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WalkerError::RootNotFound(root.clone()),
            _ => WalkerError::RootUnreadable {
                path: root.clone(),
                source: e,
            },
        })?;
        if !canonical.is_dir() {
            return Err(WalkerError::NotADirectory(root.clone()));
        }
        resolved.push(normalize_path(&canonical));
    }

    let mut kept: Vec<PathBuf> = Vec::with_capacity(resolved.len());
    for (i, root) in resolved.iter().enumerate() {
        let repeated = resolved[..i].contains(root);
        let nested = resolved
            .iter()
            .any(|other| other != root && is_within(root, other));
        if repeated || nested {
            log::debug!("Dropping overlapping root: {}", root.display());
            continue;
        }
        kept.push(root.clone());
    }
    Ok(kept)
}
