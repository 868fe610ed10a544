//! In-flight flags and per-action error scopes.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    Generate,
    Compile,
}

#[derive(Debug, Clone)]
struct Recorded {
    seq: u64,
    message: String,
}

#[derive(Debug, Default)]
struct Activity {
    generating: usize,
    compiling: usize,
    generate_error: Option<Recorded>,
    compile_error: Option<Recorded>,
    seq: u64,
}

impl Activity {
    fn counter(&mut self, scope: ErrorScope) -> &mut usize {
        match scope {
            ErrorScope::Generate => &mut self.generating,
            ErrorScope::Compile => &mut self.compiling,
        }
    }

    fn error(&mut self, scope: ErrorScope) -> &mut Option<Recorded> {
        match scope {
            ErrorScope::Generate => &mut self.generate_error,
            ErrorScope::Compile => &mut self.compile_error,
        }
    }
}

/// Point-in-time copy of the activity flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    pub generating: bool,
    pub compiling: bool,
    /// Most recently recorded message among the scopes still holding one.
    pub error: Option<String>,
    pub generate_error: Option<String>,
    pub compile_error: Option<String>,
}

/// Tracks how many generate/compile calls are in flight and the last error of
/// each scope. Overlapping calls of one kind are counted, so a flag stays set
/// until the last of them finishes.
#[derive(Debug, Default)]
pub struct ActivityBoard {
    inner: Mutex<Activity>,
}

impl ActivityBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Marks one call of `scope` in flight until the guard drops.
    pub fn begin(self: &Arc<Self>, scope: ErrorScope) -> InFlight {
        *self.inner.lock().counter(scope) += 1;
        InFlight {
            board: Arc::clone(self),
            scope,
        }
    }

    pub fn clear_error(&self, scope: ErrorScope) {
        *self.inner.lock().error(scope) = None;
    }

    pub fn record_error(&self, scope: ErrorScope, message: impl Into<String>) {
        self.record_error_if(scope, message, || true);
    }

    /// Records `message` only if `still_current` holds, checked under the
    /// board lock. Returns whether it was recorded.
    pub fn record_error_if(
        &self,
        scope: ErrorScope,
        message: impl Into<String>,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        let mut inner = self.inner.lock();
        if !still_current() {
            return false;
        }
        inner.seq += 1;
        let seq = inner.seq;
        *inner.error(scope) = Some(Recorded {
            seq,
            message: message.into(),
        });
        true
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        let inner = self.inner.lock();
        let latest = match (&inner.generate_error, &inner.compile_error) {
            (Some(g), Some(c)) => Some(if g.seq > c.seq { g } else { c }),
            (g, c) => g.as_ref().or(c.as_ref()),
        };
        ActivitySnapshot {
            generating: inner.generating > 0,
            compiling: inner.compiling > 0,
            error: latest.map(|r| r.message.clone()),
            generate_error: inner.generate_error.as_ref().map(|r| r.message.clone()),
            compile_error: inner.compile_error.as_ref().map(|r| r.message.clone()),
        }
    }
}

/// Guard returned by [`ActivityBoard::begin`]. Clears its flag on drop, which
/// covers success, failure, timeout and task cancellation alike.
#[must_use = "the in-flight flag is cleared when the guard drops"]
pub struct InFlight {
    board: Arc<ActivityBoard>,
    scope: ErrorScope,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut inner = self.board.inner.lock();
        let counter = inner.counter(self.scope);
        *counter = counter.saturating_sub(1);
    }
}
