//! reclaim - duplicate-content detection for disk space reclamation.
//!
//! Given a set of root directories, reclaim finds byte-identical regular
//! files with a three-phase funnel (size, partial BLAKE3 hash, full BLAKE3
//! hash), ranks the resulting groups by wasted space, and deletes a
//! caller-selected subset while guaranteeing one copy of every group
//! survives.
//!
//! Embedding callers use [`session::ScanSession`] (background scan with
//! progress and completion callbacks) or [`duplicates::DuplicateFinder`]
//! (synchronous). [`run_app`] is the command-line front end.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod signal;

use std::io::{self, Write};
use std::path::Path;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use serde::Serialize;

use actions::delete::DeletionOutcome;
use actions::preview::FileInfo;
use cli::{Cli, Commands, InfoArgs, OutputFormat, ScanArgs};
use config::ScanConfig;
use duplicates::{KeepPolicy, RankedGroup, ScanResult};
use error::ExitCode;
use progress::ProgressBarReporter;
use session::{ScanOutcome, ScanSession};

/// JSON document printed by `scan --output json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    summary: String,
    #[serde(flatten)]
    result: &'a ScanResult,
    suggested_keep: Vec<Option<usize>>,
    reclaimable_bytes: u64,
    deletion: Option<&'a DeletionOutcome>,
}

/// Run the command described by `cli`.
///
/// # Errors
///
/// Configuration, signal-handler, and fatal scan errors.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let Cli {
        verbose,
        quiet,
        config,
        command,
        ..
    } = cli;
    logging::init_logging(verbose, quiet);

    match command {
        Commands::Scan(args) => run_scan(args, config.as_deref(), quiet),
        Commands::Info(args) => run_info(&args),
    }
}

/// Apply command-line overrides on top of the layered configuration.
fn apply_overrides(mut config: ScanConfig, args: &ScanArgs) -> Result<ScanConfig> {
    if let Some(min) = args.min_size {
        config.minimum_file_size = min;
    }
    config
        .excluded_paths
        .extend(args.excluded_paths.iter().cloned());
    if let Some(workers) = args.workers {
        config.worker_pool_size = workers;
    }
    if let Some(window) = args.window {
        config.partial_hash_window_bytes =
            usize::try_from(window).context("Partial hash window is too large")?;
    }
    if args.include_symlinks {
        config.include_symlinked_files = true;
    }
    if let Some(keep) = args.keep {
        config.keep_policy = Some(keep.into());
    }
    if args.permanent {
        config.use_trash = false;
    }
    if args.verify {
        config.verify_before_delete = true;
    }
    config.validate()?;
    Ok(config)
}

fn run_scan(args: ScanArgs, config_path: Option<&Path>, quiet: bool) -> Result<ExitCode> {
    let config = ScanConfig::load(config_path).context("Failed to load configuration")?;
    let config = apply_overrides(config, &args)?;
    log::debug!("Effective configuration: {:?}", config);

    let cancel = signal::install_handler()?;
    let reporter = Arc::new(ProgressBarReporter::new(
        quiet || args.no_progress || args.output == OutputFormat::Json,
    ));
    let session = ScanSession::with_cancel_token(config.clone(), cancel);

    let (tx, rx) = mpsc::channel();
    let bar = Arc::clone(&reporter);
    session.start(
        args.roots.clone(),
        move |update| bar.report(&update),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;
    let outcome = rx
        .recv()
        .context("Scan thread exited without reporting a result")?;
    session.wait();
    reporter.finish();

    let result = match outcome {
        ScanOutcome::Completed(result) | ScanOutcome::Cancelled(result) => result,
        ScanOutcome::Failed(err) => return Err(err).context("Scan failed"),
    };

    let policy = match config.keep_policy {
        Some(policy) => Some(policy),
        None if args.delete => Some(KeepPolicy::default()),
        None => None,
    };
    let ranked = result.ranked(policy);

    let deletion = if args.delete && !result.interrupted {
        let selected: Vec<_> = ranked
            .iter()
            .flat_map(RankedGroup::removal_candidates)
            .map(Path::to_path_buf)
            .collect();
        Some(session.delete_selected(&selected, &result.groups))
    } else {
        if args.delete {
            log::warn!("Scan was interrupted; skipping deletion");
        }
        None
    };

    let mut out = io::stdout().lock();
    match args.output {
        OutputFormat::Json => {
            let report = JsonReport {
                summary: result.summary(),
                result: &result,
                suggested_keep: ranked.iter().map(|g| g.suggested_keep).collect(),
                reclaimable_bytes: result.reclaimable_bytes(),
                deletion: deletion.as_ref(),
            };
            serde_json::to_writer_pretty(&mut out, &report)
                .context("Failed to write JSON report")?;
            writeln!(out)?;
        }
        OutputFormat::Text => print_text(&mut out, &result, &ranked, deletion.as_ref())?,
    }

    Ok(exit_code_for(&result, deletion.as_ref()))
}

fn print_text(
    out: &mut impl Write,
    result: &ScanResult,
    ranked: &[RankedGroup],
    deletion: Option<&DeletionOutcome>,
) -> io::Result<()> {
    for (i, ranked_group) in ranked.iter().enumerate() {
        let group = &ranked_group.group;
        writeln!(
            out,
            "Group {} - {} copies, {} total, {} reclaimable{}",
            i + 1,
            group.len(),
            group.formatted_total_size(),
            group.formatted_reclaimable_size(),
            group
                .file_extension()
                .map(|ext| format!(" [.{ext}]"))
                .unwrap_or_default()
        )?;
        for (m, member) in group.members.iter().enumerate() {
            let marker = if ranked_group.suggested_keep == Some(m) {
                "keep"
            } else {
                "    "
            };
            writeln!(out, "  {marker} {}", member.path.display())?;
        }
        writeln!(out)?;
    }

    for err in &result.errors {
        writeln!(out, "warning: {err}")?;
    }
    writeln!(out, "{}", result.summary())?;
    if let Some(deletion) = deletion {
        for (path, failure) in &deletion.failed_paths {
            writeln!(out, "failed: {} ({})", path.display(), failure.message)?;
        }
        writeln!(out, "{}", deletion.summary())?;
    }
    Ok(())
}

fn exit_code_for(result: &ScanResult, deletion: Option<&DeletionOutcome>) -> ExitCode {
    if result.interrupted {
        ExitCode::Interrupted
    } else if result.has_errors() || deletion.is_some_and(|d| !d.is_complete()) {
        ExitCode::PartialSuccess
    } else if result.groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}

fn run_info(args: &InfoArgs) -> Result<ExitCode> {
    let mut out = io::stdout().lock();
    let mut failed = false;
    for path in &args.paths {
        match FileInfo::inspect(path) {
            Ok(info) => writeln!(
                out,
                "{}\t{}\t{}{}",
                info.formatted_size,
                info.formatted_modified(),
                info.path.display(),
                if info.readonly { " (read-only)" } else { "" }
            )?,
            Err(err) => {
                log::warn!("{}", err);
                failed = true;
            }
        }
    }
    Ok(if failed {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}
