//! BLAKE3 content fingerprints in escalating phases.
//!
//! | Phase | Digest | Bytes read |
//! |---|---|---|
//! | [`Phase::SizeOnly`] | exact byte size | none (metadata) |
//! | [`Phase::PartialHash`] | BLAKE3 of the first N bytes, plus the last N bytes when size > 2N | at most 2N |
//! | [`Phase::FullHash`] | BLAKE3 of the whole file | size, streamed in fixed chunks |
//!
//! N is the partial window (4 KiB by default). For files no larger than N
//! the partial window already covers the whole content, so the partial and
//! full digests coincide and the full phase reuses the partial digest.
//!
//! Every read is preceded by a cancellation check, so a cancelled scan stops
//! within one chunk read. Read failures are returned as [`HashError`] and
//! turned into soft errors by the caller.

use super::FileCandidate;
use crate::error::{ErrorKind, PathError};
use crate::signal::CancelToken;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A 256-bit BLAKE3 digest.
pub type Hash = [u8; 32];

/// Default partial window in bytes.
pub const DEFAULT_PARTIAL_WINDOW: usize = 4096;

/// Default chunk size for streamed full hashing.
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Fingerprinting phase, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Phase {
    /// Digest is the file size.
    SizeOnly,
    /// Digest covers a bounded prefix (and suffix) window.
    PartialHash,
    /// Digest covers the entire content.
    FullHash,
}

impl Phase {
    /// The following phase, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::SizeOnly => Some(Self::PartialHash),
            Self::PartialHash => Some(Self::FullHash),
            Self::FullHash => None,
        }
    }
}

/// A phase-tagged digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Size bucket key.
    Size(u64),
    /// Windowed content digest.
    Partial(Hash),
    /// Whole content digest.
    Full(Hash),
}

impl Fingerprint {
    /// The phase that produced this fingerprint.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Size(_) => Phase::SizeOnly,
            Self::Partial(_) => Phase::PartialHash,
            Self::Full(_) => Phase::FullHash,
        }
    }

    /// The content digest, for hash phases.
    #[must_use]
    pub fn digest(&self) -> Option<&Hash> {
        match self {
            Self::Size(_) => None,
            Self::Partial(h) | Self::Full(h) => Some(h),
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file disappeared after discovery.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Read permission was revoked or never granted.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other read failure.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file's length no longer matches the size seen at discovery.
    #[error("File changed while hashing: {path} (expected {expected} bytes, read {actual})")]
    Changed {
        /// Path being read
        path: PathBuf,
        /// Size at discovery
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// Cancellation was requested before the next read.
    #[error("Hashing interrupted")]
    Interrupted,
}

impl HashError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Taxonomy kind, or `None` for cancellation (which is not an error).
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NotFound(_) => Some(ErrorKind::FileVanished),
            Self::PermissionDenied(_) => Some(ErrorKind::PathUnreadable),
            Self::Io { source, .. } => Some(ErrorKind::from_read_error(source)),
            Self::Changed { .. } => Some(ErrorKind::ContentChanged),
            Self::Interrupted => None,
        }
    }

    /// Convert into a soft per-path error. Cancellation yields `None`.
    #[must_use]
    pub fn to_path_error(&self, path: &Path) -> Option<PathError> {
        self.kind()
            .map(|kind| PathError::new(path, kind, self.to_string()))
    }
}

/// Snapshot of the fingerprinter's read counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadCounts {
    /// Files opened for a partial (windowed) hash
    pub partial_reads: u64,
    /// Files opened for a full hash
    pub full_reads: u64,
    /// Total content bytes read
    pub bytes_read: u64,
}

/// Computes phase fingerprints for candidates.
///
/// `Fingerprinter` is `Sync`; one instance is shared by all workers.
#[derive(Debug)]
pub struct Fingerprinter {
    window: usize,
    chunk_size: usize,
    cancel: CancelToken,
    partial_reads: AtomicU64,
    full_reads: AtomicU64,
    bytes_read: AtomicU64,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter {
    /// Create a fingerprinter with the default window and chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: DEFAULT_PARTIAL_WINDOW,
            chunk_size: DEFAULT_READ_CHUNK,
            cancel: CancelToken::new(),
            partial_reads: AtomicU64::new(0),
            full_reads: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }

    /// Set the partial window N. Clamped to at least one byte.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Set the streaming chunk size. Clamped to at least one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Observe `token` before every read.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Partial window in bytes.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Whether a partial digest of a file of `size` bytes covers its whole content.
    #[must_use]
    pub fn partial_covers_file(&self, size: u64) -> bool {
        size <= self.window as u64
    }

    /// Current read counters.
    #[must_use]
    pub fn read_counts(&self) -> ReadCounts {
        ReadCounts {
            partial_reads: self.partial_reads.load(Ordering::Relaxed),
            full_reads: self.full_reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// Compute the fingerprint of `candidate` at `phase`.
    ///
    /// # Errors
    ///
    /// Any [`HashError`]; the candidate should then leave grouping.
    pub fn fingerprint(
        &self,
        candidate: &FileCandidate,
        phase: Phase,
    ) -> Result<Fingerprint, HashError> {
        match phase {
            Phase::SizeOnly => Ok(Fingerprint::Size(candidate.size)),
            Phase::PartialHash => self
                .partial_hash(&candidate.path, candidate.size)
                .map(Fingerprint::Partial),
            Phase::FullHash => self
                .full_hash(&candidate.path, candidate.size)
                .map(Fingerprint::Full),
        }
    }

    /// Hash the prefix window, plus the suffix window when `size > 2N`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Changed`] if fewer bytes than expected could be
    /// read, which means the file shrank after discovery.
    pub fn partial_hash(&self, path: &Path, size: u64) -> Result<Hash, HashError> {
        self.check_cancelled()?;
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.partial_reads.fetch_add(1, Ordering::Relaxed);

        let window = self.window as u64;
        let mut hasher = blake3::Hasher::new();

        let prefix_len = size.min(window);
        let got = self.read_window(&mut file, path, prefix_len, &mut hasher)?;
        if got != prefix_len {
            return Err(HashError::Changed {
                path: path.to_path_buf(),
                expected: size,
                actual: got,
            });
        }

        if size > window.saturating_mul(2) {
            self.check_cancelled()?;
            file.seek(SeekFrom::Start(size - window))
                .map_err(|e| HashError::from_io(path, e))?;
            let got = self.read_window(&mut file, path, window, &mut hasher)?;
            if got != window {
                return Err(HashError::Changed {
                    path: path.to_path_buf(),
                    expected: size,
                    actual: size - window + got,
                });
            }
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash the entire file, streamed in fixed-size chunks.
    ///
    /// Peak memory is one chunk regardless of file size.
    ///
    /// # Errors
    ///
    /// [`HashError::Interrupted`] if cancelled between chunks;
    /// [`HashError::Changed`] if the byte count differs from `expected_size`.
    pub fn full_hash(&self, path: &Path, expected_size: u64) -> Result<Hash, HashError> {
        self.check_cancelled()?;
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.full_reads.fetch_add(1, Ordering::Relaxed);

        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            self.check_cancelled()?;
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
            self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        }

        if total != expected_size {
            return Err(HashError::Changed {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: total,
            });
        }

        log::trace!("Full hash {} ({} bytes)", path.display(), total);
        Ok(*hasher.finalize().as_bytes())
    }

    fn read_window(
        &self,
        file: &mut File,
        path: &Path,
        len: u64,
        hasher: &mut blake3::Hasher,
    ) -> Result<u64, HashError> {
        let mut buffer = Vec::with_capacity(len as usize);
        file.by_ref()
            .take(len)
            .read_to_end(&mut buffer)
            .map_err(|e| HashError::from_io(path, e))?;
        hasher.update(&buffer);
        self.bytes_read
            .fetch_add(buffer.len() as u64, Ordering::Relaxed);
        Ok(buffer.len() as u64)
    }

    fn check_cancelled(&self) -> Result<(), HashError> {
        if self.cancel.is_cancelled() {
            Err(HashError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Hex-encode a digest.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a 64-character hex digest.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}
