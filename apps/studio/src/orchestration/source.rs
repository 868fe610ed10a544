//! The single authoritative document source, with change subscribers.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

type Subscriber = Box<dyn Fn(&str, u64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSnapshot {
    pub source: String,
    pub revision: u64,
}

/// Mutable text cell. Every change bumps the revision and notifies
/// subscribers with the new text; setting an identical value is not a change.
///
/// Notifications are delivered in revision order. Subscribers must not call
/// `set` on the same cell.
pub struct SourceCell {
    state: RwLock<SourceSnapshot>,
    subscribers: RwLock<Vec<Subscriber>>,
    /// Held across update and notification so concurrent sets notify in order.
    notify: Mutex<()>,
}

impl SourceCell {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(SourceSnapshot {
                source: initial.into(),
                revision: 0,
            }),
            subscribers: RwLock::new(Vec::new()),
            notify: Mutex::new(()),
        }
    }

    pub fn get(&self) -> String {
        self.state.read().source.clone()
    }

    pub fn snapshot(&self) -> SourceSnapshot {
        self.state.read().clone()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Replaces the text in full. Subscribers run after the write lock is
    /// released, so they may read the cell.
    pub fn set(&self, source: impl Into<String>) -> bool {
        let source = source.into();
        let _ordered = self.notify.lock();
        let revision = {
            let mut state = self.state.write();
            if state.source == source {
                return false;
            }
            state.source.clone_from(&source);
            state.revision += 1;
            state.revision
        };

        for subscriber in self.subscribers.read().iter() {
            subscriber(&source, revision);
        }
        true
    }

    pub fn subscribe(&self, subscriber: impl Fn(&str, u64) + Send + Sync + 'static) {
        self.subscribers.write().push(Box::new(subscriber));
    }
}
