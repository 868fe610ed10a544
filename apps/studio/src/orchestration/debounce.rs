//! Debounce Scheduler: coalesces rapid triggers into a single delayed action.
//!
//! Every `arm` aborts the pending timer and starts a fresh one, so only the
//! trigger that survives a full quiet period fires. Once a timer fires, the
//! action runs on its own task: cancelling afterwards never aborts it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default quiet period before a compile-on-change fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Single-channel debounce timer with an owned lifetime.
///
/// Dropping the scheduler cancels a pending timer.
pub struct DebounceScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    armed: AtomicU64,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
            armed: AtomicU64::new(0),
        }
    }

    /// Restarts the timer: `action` runs once after `delay` unless another
    /// `arm`, `cancel` or `close` comes first. Ignored once closed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if self.closed.load(Ordering::SeqCst) {
            debug!("Debounce scheduler closed; trigger ignored");
            return;
        }

        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let generation = self.armed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Debounce armed (#{generation}, {}ms)",
            delay.as_millis()
        );

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Debounce #{generation} fired");
            tokio::spawn(action);
        }));
    }

    /// Cancels the pending timer. Returns true if a timer was still waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                if waiting {
                    debug!("Pending debounce timer cancelled");
                }
                waiting
            }
            None => false,
        }
    }

    /// Cancels any pending timer and refuses further `arm` calls.
    pub fn close(&self) -> bool {
        let mut pending = self.pending.lock();
        self.closed.store(true, Ordering::SeqCst);
        match pending.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of times the timer has been (re)armed.
    pub fn armed_count(&self) -> u64 {
        self.armed.load(Ordering::SeqCst)
    }
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
