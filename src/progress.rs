//! Scan progress aggregation and terminal display.
//!
//! [`ProgressTracker`] counts units of work from many worker threads and
//! turns them into a fraction for the caller's callback:
//!
//! - every discovered file is one unit;
//! - every fingerprint read (partial or full) is one unit.
//!
//! The denominator is a best-effort estimate. During the walk each file is
//! assumed to need one more unit of hashing; once files are bucketed by size
//! the estimate is replaced by the real pending work and shrinks whenever a
//! bucket eliminates candidates. The completed count only grows, and the
//! reported fraction never decreases.
//!
//! [`ProgressBarReporter`] renders updates with indicatif for the binary.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Coarse stage of a scan, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanPhase {
    /// Enumerating files.
    Walking,
    /// Partial and full hashing of size collisions.
    Hashing,
    /// All work accounted for.
    Done,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walking => f.write_str("Walking"),
            Self::Hashing => f.write_str("Hashing"),
            Self::Done => f.write_str("Done"),
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub phase: ScanPhase,
    /// Units of work completed so far
    pub completed: u64,
    /// Current estimate of total units
    pub estimated_total: u64,
    /// Monotonic fraction in `0.0..=1.0`
    pub fraction: f64,
}

/// Callback receiving progress updates. May be invoked from worker threads.
pub type ProgressFn = dyn Fn(ProgressUpdate) + Send + Sync;

/// Reported fraction granularity (per mille).
const RESOLUTION: u64 = 1000;

struct Reported {
    permille: u64,
    phase: ScanPhase,
}

/// Thread-safe progress aggregator.
pub struct ProgressTracker {
    completed: AtomicU64,
    estimated_total: AtomicU64,
    reported: Mutex<Reported>,
    callback: Option<Box<ProgressFn>>,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .field("estimated_total", &self.estimated_total.load(Ordering::Relaxed))
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::silent()
    }
}

impl ProgressTracker {
    /// Tracker forwarding updates to `callback`.
    pub fn new(callback: impl Fn(ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self::with_callback(Some(Box::new(callback)))
    }

    /// Tracker that only counts.
    #[must_use]
    pub fn silent() -> Self {
        Self::with_callback(None)
    }

    fn with_callback(callback: Option<Box<ProgressFn>>) -> Self {
        Self {
            completed: AtomicU64::new(0),
            estimated_total: AtomicU64::new(0),
            reported: Mutex::new(Reported {
                permille: 0,
                phase: ScanPhase::Walking,
            }),
            callback,
        }
    }

    /// A file was discovered; assume it will need one hashing unit.
    pub fn file_discovered(&self) {
        self.estimated_total.fetch_add(2, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.report(None);
    }

    /// Walk finished; `pending_units` hashing units remain.
    pub fn begin_hashing(&self, pending_units: u64) {
        let done = self.completed.load(Ordering::Relaxed);
        self.estimated_total
            .store(done.saturating_add(pending_units), Ordering::Relaxed);
        self.report(Some(ScanPhase::Hashing));
    }

    /// One fingerprint read finished.
    pub fn unit_done(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.report(None);
    }

    /// `units` of previously estimated work will not be needed.
    pub fn drop_units(&self, units: u64) {
        let _ = self
            .estimated_total
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_sub(units))
            });
        self.report(None);
    }

    /// All work is done; report 100%.
    pub fn finish(&self) {
        let done = self.completed.load(Ordering::Relaxed);
        self.estimated_total.store(done, Ordering::Relaxed);
        self.report(Some(ScanPhase::Done));
    }

    /// Completed units so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Current total estimate.
    #[must_use]
    pub fn estimated_total(&self) -> u64 {
        self.estimated_total.load(Ordering::Relaxed)
    }

    /// Highest fraction reported so far.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        let permille = match self.reported.lock() {
            Ok(r) => r.permille,
            Err(poisoned) => poisoned.into_inner().permille,
        };
        permille as f64 / RESOLUTION as f64
    }

    fn report(&self, phase: Option<ScanPhase>) {
        let completed = self.completed.load(Ordering::Relaxed);
        let total = self.estimated_total.load(Ordering::Relaxed);
        let permille = if phase == Some(ScanPhase::Done) {
            RESOLUTION
        } else if total == 0 {
            0
        } else {
            (completed.min(total) * RESOLUTION / total).min(RESOLUTION - 1)
        };

        // Serialize notifications so the callback sees a non-decreasing fraction.
        let mut reported = match self.reported.lock() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        let phase_changed = phase.is_some_and(|p| p != reported.phase);
        if permille <= reported.permille && !phase_changed {
            return;
        }
        reported.permille = reported.permille.max(permille);
        if let Some(p) = phase {
            reported.phase = p;
        }

        if let Some(callback) = &self.callback {
            callback(ProgressUpdate {
                phase: reported.phase,
                completed,
                estimated_total: total.max(completed),
                fraction: reported.permille as f64 / RESOLUTION as f64,
            });
        }
    }
}

/// Terminal progress bar driven by [`ProgressUpdate`]s.
pub struct ProgressBarReporter {
    bar: Option<ProgressBar>,
}

impl ProgressBarReporter {
    /// Create a reporter. When `quiet` is true nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(RESOLUTION);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Render one update.
    pub fn report(&self, update: &ProgressUpdate) {
        if let Some(bar) = &self.bar {
            bar.set_position((update.fraction * RESOLUTION as f64) as u64);
            bar.set_message(format!(
                "{} ({}/{} units)",
                update.phase, update.completed, update.estimated_total
            ));
        }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
