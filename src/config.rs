//! Scan configuration.
//!
//! Every field is optional and defaulted. Values are layered with figment:
//!
//! 1. built-in defaults
//! 2. a TOML file (explicit path, or `config.toml` in the platform config dir)
//! 3. `RECLAIM_*` environment variables
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```no_run
//! use reclaim::config::ScanConfig;
//!
//! let config = ScanConfig::load(None).unwrap_or_default();
//! assert!(config.worker_pool_size >= 1);
//! ```

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::duplicates::KeepPolicy;
use crate::scanner::hasher::{DEFAULT_PARTIAL_WINDOW, DEFAULT_READ_CHUNK};
use crate::scanner::FilterConfig;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RECLAIM_";

/// Default minimum candidate size (1 MiB).
pub const DEFAULT_MINIMUM_FILE_SIZE: u64 = 1024 * 1024;

/// Errors from loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A provider failed to parse or extract.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Tunables for scanning, fingerprinting and deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files smaller than this are ignored.
    pub minimum_file_size: u64,
    /// Subtrees never scanned.
    pub excluded_paths: Vec<PathBuf>,
    /// Prefix/suffix window for the partial hash.
    pub partial_hash_window_bytes: usize,
    /// Worker threads for walking and hashing.
    pub worker_pool_size: usize,
    /// Chunk size for streamed full hashing.
    pub read_chunk_bytes: usize,
    /// Treat symlinks resolving to regular files as candidates.
    pub include_symlinked_files: bool,
    /// Move deleted files to the platform trash instead of unlinking.
    pub use_trash: bool,
    /// Refuse to delete files whose size or mtime changed since the scan.
    pub verify_unchanged: bool,
    /// Compare bytes against a surviving copy before each deletion.
    pub verify_before_delete: bool,
    /// Keep suggestion attached to ranked groups.
    pub keep_policy: Option<KeepPolicy>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            minimum_file_size: DEFAULT_MINIMUM_FILE_SIZE,
            excluded_paths: Vec::new(),
            partial_hash_window_bytes: DEFAULT_PARTIAL_WINDOW,
            worker_pool_size: default_worker_pool_size(),
            read_chunk_bytes: DEFAULT_READ_CHUNK,
            include_symlinked_files: false,
            use_trash: true,
            verify_unchanged: true,
            verify_before_delete: false,
            keep_policy: None,
        }
    }
}

/// Number of CPU cores, falling back to 4 when it cannot be determined.
#[must_use]
pub fn default_worker_pool_size() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

impl ScanConfig {
    /// Load layered configuration.
    ///
    /// With `path = None`, the platform config file is used if it exists.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] if a provider cannot be parsed,
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut figment = Figment::from(Serialized::defaults(ScanConfig::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        let config: ScanConfig = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Platform-specific default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "reclaim", "reclaim")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.partial_hash_window_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "partial_hash_window_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "read_chunk_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Filter configuration for the given roots.
    #[must_use]
    pub fn filter_config(&self, roots: &[PathBuf]) -> FilterConfig {
        FilterConfig::new(roots.to_vec())
            .with_excluded_paths(self.excluded_paths.clone())
            .with_minimum_file_size(self.minimum_file_size)
            .with_symlinked_files(self.include_symlinked_files)
    }

    /// Set the minimum file size.
    #[must_use]
    pub fn with_minimum_file_size(mut self, bytes: u64) -> Self {
        self.minimum_file_size = bytes;
        self
    }

    /// Set the excluded paths.
    #[must_use]
    pub fn with_excluded_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.excluded_paths = paths;
        self
    }

    /// Set the partial hash window.
    #[must_use]
    pub fn with_partial_hash_window(mut self, bytes: usize) -> Self {
        self.partial_hash_window_bytes = bytes;
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn with_worker_pool_size(mut self, workers: usize) -> Self {
        self.worker_pool_size = workers;
        self
    }

    /// Set the full-hash read chunk size.
    #[must_use]
    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = bytes;
        self
    }

    /// Allow symlinks to regular files as candidates.
    #[must_use]
    pub fn with_symlinked_files(mut self, include: bool) -> Self {
        self.include_symlinked_files = include;
        self
    }

    /// Choose trash or permanent deletion.
    #[must_use]
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Enable byte-for-byte verification before deletion.
    #[must_use]
    pub fn with_verify_before_delete(mut self, verify: bool) -> Self {
        self.verify_before_delete = verify;
        self
    }

    /// Attach a keep suggestion to every ranked group.
    #[must_use]
    pub fn with_keep_policy(mut self, policy: Option<KeepPolicy>) -> Self {
        self.keep_policy = policy;
        self
    }
}
