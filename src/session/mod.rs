//! Scan lifecycle for embedding callers.
//!
//! A [`ScanSession`] runs one [`DuplicateFinder`] at a time on a background
//! thread and reports through two callbacks: progress (any number of times,
//! from the scanning thread) and completion (exactly once per scan).
//!
//! # States
//!
//! ```text
//! Idle ──start──▶ Scanning ──┬──▶ Completed
//!                            ├──▶ Cancelled   (after stop())
//!                            └──▶ Failed      (bad root, pool failure)
//! ```
//!
//! Any terminal state may `start` again, including from inside the
//! completion callback. `start` while `Scanning` is rejected; run
//! concurrent scans from separate sessions.
//!
//! The cancel token may be shared (the CLI passes its Ctrl+C token). `start`
//! only clears a cancellation that this session's own `stop` requested, so a
//! cancellation from elsewhere is never lost.
//!
//! # Example
//!
//! ```no_run
//! use reclaim::config::ScanConfig;
//! use reclaim::session::{ScanOutcome, ScanSession};
//! use std::path::PathBuf;
//!
//! let session = ScanSession::new(ScanConfig::default());
//! session
//!     .start(
//!         vec![PathBuf::from("/home/user")],
//!         |update| println!("{:.0}%", update.fraction * 100.0),
//!         |outcome| {
//!             if let ScanOutcome::Completed(result) = outcome {
//!                 println!("{}", result.summary());
//!             }
//!         },
//!     )
//!     .unwrap();
//! session.wait();
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::actions::delete::{DeleteConfig, Deleter, DeletionOutcome};
use crate::config::ScanConfig;
use crate::duplicates::{DuplicateFinder, DuplicateGroup, FinderError, ScanResult};
use crate::progress::{ProgressTracker, ProgressUpdate};
use crate::signal::CancelToken;

/// Lifecycle state of a [`ScanSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No scan has been started.
    Idle,
    /// A scan is running.
    Scanning,
    /// The last scan ran to completion.
    Completed,
    /// The last scan was stopped; its result holds only fully resolved groups.
    Cancelled,
    /// The last scan could not start or run.
    Failed,
}

/// What the completion callback receives.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Full result.
    Completed(ScanResult),
    /// Partial result after `stop()`.
    Cancelled(ScanResult),
    /// Fatal error; no result.
    Failed(FinderError),
}

impl ScanOutcome {
    /// Terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed(_) => SessionState::Completed,
            Self::Cancelled(_) => SessionState::Cancelled,
            Self::Failed(_) => SessionState::Failed,
        }
    }

    /// The scan result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            Self::Completed(r) | Self::Cancelled(r) => Some(r),
            Self::Failed(_) => None,
        }
    }
}

/// Errors from [`ScanSession::start`].
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// A scan is already running on this session.
    #[error("A scan is already running on this session")]
    AlreadyScanning,

    /// The background thread could not be spawned.
    #[error("Failed to spawn scan thread: {0}")]
    ThreadSpawn(#[source] io::Error),
}

/// Owns the lifecycle of one scan at a time.
pub struct ScanSession {
    config: ScanConfig,
    cancel: CancelToken,
    stop_requested: AtomicBool,
    state: Arc<Mutex<SessionState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSession")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Join a finished or finishing worker. Returns `false` if it panicked.
///
/// Called from the worker itself (a callback restarting or dropping the
/// session), the handle is detached instead: a thread cannot join itself.
fn reap(handle: JoinHandle<()>) -> bool {
    if handle.thread().id() == thread::current().id() {
        log::debug!("Detaching scan thread from inside its own callback");
        return true;
    }
    if handle.join().is_err() {
        log::error!("Scan thread panicked");
        return false;
    }
    true
}

impl ScanSession {
    /// Create an idle session.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self::with_cancel_token(config, CancelToken::new())
    }

    /// Create an idle session that observes an existing token, e.g. the
    /// process-wide Ctrl+C token.
    #[must_use]
    pub fn with_cancel_token(config: ScanConfig, cancel: CancelToken) -> Self {
        Self {
            config,
            cancel,
            stop_requested: AtomicBool::new(false),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            worker: Mutex::new(None),
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Whether a scan is running.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state() == SessionState::Scanning
    }

    /// Start scanning `roots` in the background.
    ///
    /// Returns immediately. `on_progress` is called from the scanning thread
    /// with a non-decreasing fraction; `on_complete` is called once, after
    /// the state has moved to the matching terminal state.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyScanning`] while a scan is running,
    /// [`SessionError::ThreadSpawn`] if the thread cannot be created.
    pub fn start<P, C>(
        &self,
        roots: Vec<PathBuf>,
        on_progress: P,
        on_complete: C,
    ) -> Result<(), SessionError>
    where
        P: Fn(ProgressUpdate) + Send + Sync + 'static,
        C: FnOnce(ScanOutcome) + Send + 'static,
    {
        let mut state = lock(&self.state);
        if *state == SessionState::Scanning {
            return Err(SessionError::AlreadyScanning);
        }
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            self.cancel.reset();
        }

        let finder = DuplicateFinder::new(self.config.clone())
            .with_cancel_token(self.cancel.clone())
            .with_progress(Arc::new(ProgressTracker::new(on_progress)));
        let shared_state = Arc::clone(&self.state);

        let handle = thread::Builder::new()
            .name("reclaim-scan".to_string())
            .spawn(move || {
                let outcome = match finder.find(roots) {
                    Ok(result) if result.interrupted => ScanOutcome::Cancelled(result),
                    Ok(result) => ScanOutcome::Completed(result),
                    Err(err) => {
                        log::error!("Scan failed: {}", err);
                        ScanOutcome::Failed(err)
                    }
                };
                *lock(&shared_state) = outcome.state();
                log::debug!("Scan session finished: {:?}", outcome.state());
                on_complete(outcome);
            })
            .map_err(SessionError::ThreadSpawn)?;

        *state = SessionState::Scanning;
        drop(state);

        // A previous worker has already published its terminal state; reap it.
        let previous = lock(&self.worker).replace(handle);
        if let Some(previous) = previous {
            reap(previous);
        }
        Ok(())
    }

    /// Request cancellation. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        if self.is_scanning() {
            log::info!("Stopping scan");
            self.stop_requested.store(true, Ordering::SeqCst);
            self.cancel.cancel();
        }
    }

    /// Block until the current scan, if any, has finished and return the
    /// resulting state.
    ///
    /// From inside a callback of the running scan this returns without
    /// blocking.
    pub fn wait(&self) -> SessionState {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if !reap(handle) {
                *lock(&self.state) = SessionState::Failed;
            }
        }
        self.state()
    }

    /// Delete `paths` from `groups` using this session's deletion settings.
    ///
    /// Independent of scan state; may be called repeatedly.
    #[must_use]
    pub fn delete_selected(&self, paths: &[PathBuf], groups: &[DuplicateGroup]) -> DeletionOutcome {
        Deleter::new(DeleteConfig::from(&self.config)).delete(paths, groups)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}
