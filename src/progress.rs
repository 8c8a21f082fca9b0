//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::{Error, Result};

/// Receives progress updates from a tracking run.
///
/// Purely observational: implementations must not influence the result.
/// Calls may come from worker threads.
pub trait ProgressLogger: Send + Sync {
    /// Short description of the current step.
    fn set_status(&self, status: &str);

    /// Completion of the current run, in [0, 1].
    fn set_progress(&self, progress: f64);

    /// Free-form message.
    fn log(&self, message: &str) {
        let _ = message;
    }
}

/// Forwards progress to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ProgressLogger for TracingLogger {
    fn set_status(&self, status: &str) {
        info!(status, "tracking status");
    }

    fn set_progress(&self, progress: f64) {
        debug!(progress, "tracking progress");
    }

    fn log(&self, message: &str) {
        info!("{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidLogger;

impl ProgressLogger for VoidLogger {
    fn set_status(&self, _status: &str) {}

    fn set_progress(&self, _progress: f64) {}
}

/// Shareable cancellation flag with a reason.
///
/// Clones share the same flag, so a token handed to another thread can
/// cancel a run in progress. Cancellation is sticky until `reset`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The first reason given is kept.
    pub fn cancel(&self, reason: &str) {
        if let Ok(mut slot) = self.reason.lock() {
            if slot.is_none() {
                *slot = Some(reason.to_string());
            }
        }
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Reason given to `cancel`, if canceled.
    pub fn reason(&self) -> Option<String> {
        if !self.is_canceled() {
            return None;
        }
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }

    /// Clear the flag and the reason.
    pub fn reset(&self) {
        if let Ok(mut slot) = self.reason.lock() {
            *slot = None;
        }
        self.canceled.store(false, Ordering::SeqCst);
    }

    /// Fail with `Error::Canceled` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled(self.reason().unwrap_or_default()))
        } else {
            Ok(())
        }
    }
}
