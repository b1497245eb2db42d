//! Command-line interface definitions for reclaim.
//!
//! Global options (verbosity, config file, error format) come before the
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates over 1 MiB (the default threshold)
//! reclaim scan ~/Downloads ~/Documents
//!
//! # JSON output for scripting
//! reclaim scan ~/Downloads --output json
//!
//! # Trash every copy but the oldest in each group
//! reclaim scan ~/Downloads --keep oldest --delete
//!
//! # Verbose mode for debugging
//! reclaim -v scan ~/Downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::KeepPolicy;

/// Find byte-identical files and reclaim the space they waste.
#[derive(Debug, Parser)]
#[command(name = "reclaim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "FILE", global = true, env = "RECLAIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories for duplicate files
    Scan(ScanArgs),
    /// Show size and timestamps of files
    Info(InfoArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Minimum file size to consider (e.g., 1KB, 1MiB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Directories to skip (can be specified multiple times)
    #[arg(short, long = "exclude", value_name = "PATH")]
    pub excluded_paths: Vec<PathBuf>,

    /// Worker threads for walking and hashing (default: CPU count)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Prefix/suffix window for the partial hash, in bytes
    #[arg(long, value_name = "BYTES", value_parser = parse_size)]
    pub window: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Suggest which copy to keep in each group
    #[arg(short, long, value_enum, value_name = "POLICY")]
    pub keep: Option<KeepArg>,

    /// Delete every copy except the suggested keeper (default policy: oldest)
    #[arg(long)]
    pub delete: bool,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Compare bytes against the kept copy before each deletion
    #[arg(long, requires = "delete")]
    pub verify: bool,

    /// Follow symlinks that point at regular files
    #[arg(long)]
    pub include_symlinks: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the info subcommand.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Files to inspect
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Keep policy as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepArg {
    /// Oldest modification time
    Oldest,
    /// Newest modification time
    Newest,
    /// Most deeply nested path
    Deepest,
    /// Least deeply nested path
    Shallowest,
}

impl From<KeepArg> for KeepPolicy {
    fn from(arg: KeepArg) -> Self {
        match arg {
            KeepArg::Oldest => KeepPolicy::Oldest,
            KeepArg::Newest => KeepPolicy::Newest,
            KeepArg::Deepest => KeepPolicy::DeepestPath,
            KeepArg::Shallowest => KeepPolicy::ShallowestPath,
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use reclaim::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
