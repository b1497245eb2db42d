//! Cooperative cancellation and Ctrl+C handling.
//!
//! A [`CancelToken`] is a shared `AtomicBool`. Clones observe the same flag,
//! so one clone can be handed to the walker, the fingerprinter and the
//! session while the caller keeps another to request cancellation.
//!
//! Cancellation is only ever observed at defined points: directory
//! boundaries in the walker and before each chunk read in the fingerprinter.
//! Nothing is interrupted mid-syscall.
//!
//! ```rust,no_run
//! use reclaim::signal::install_handler;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//! // Pass `token.clone()` to a ScanSession or DuplicateFinder.
//! if token.is_cancelled() {
//!     println!("Interrupted");
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install a Ctrl+C handler that cancels the returned token.
///
/// Only one handler can exist per process. Later calls (tests calling
/// `run_app` repeatedly) receive the already-installed token, reset to the
/// not-cancelled state.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the OS refuses the handler and
/// none was installed earlier by this module.
pub fn install_handler() -> Result<CancelToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancelToken::new();
    let handler_token = token.clone();

    let installed = ctrlc::set_handler(move || {
        handler_token.cancel();
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing in-flight work...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked token");
            Ok(GLOBAL_TOKEN.get_or_init(CancelToken::new).clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
