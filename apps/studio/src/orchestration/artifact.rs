//! Artifact Resource Manager: owns the single live rendered-document handle.
//!
//! Handles come from `acquire` and leave only through `install`, `install_if`,
//! `discard` or `release_all`, so every acquire is matched by exactly one
//! release. The slot lock covers swap and release together: observers never
//! see two live handles, and a released id never resolves again.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Opaque reference to a rendered artifact. Deliberately not `Clone`: the
/// manager is the only owner.
#[derive(Debug)]
pub struct ArtifactHandle {
    id: Uuid,
    bytes: Bytes,
    content_type: String,
    created_at: DateTime<Utc>,
}

impl ArtifactHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            id: self.id,
            content_type: self.content_type.clone(),
            byte_len: self.bytes.len(),
            created_at: self.created_at,
        }
    }

    fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            info: self.info(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Display metadata for a live artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    pub id: Uuid,
    pub content_type: String,
    pub byte_len: usize,
    pub created_at: DateTime<Utc>,
}

/// What a viewer gets: metadata plus the bytes to display or save.
#[derive(Debug, Clone)]
pub struct ArtifactSnapshot {
    pub info: ArtifactInfo,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The handle is live. `replaced` was released in the same step.
    Installed { replaced: Option<Uuid> },
    /// The predicate refused the handle; it was released.
    Rejected,
    /// The manager was already torn down; the handle was released.
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactCounters {
    pub acquired: u64,
    pub released: u64,
    pub live: bool,
}

#[derive(Default)]
struct Slot {
    current: Option<ArtifactHandle>,
    acquired: u64,
    released: u64,
    closed: bool,
}

impl Slot {
    fn release(&mut self, handle: ArtifactHandle) {
        self.released += 1;
        debug!(
            "Released artifact {} ({} bytes, {} outstanding)",
            handle.id,
            handle.bytes.len(),
            self.acquired - self.released
        );
    }
}

#[derive(Default)]
pub struct ArtifactManager {
    slot: Mutex<Slot>,
}

impl ArtifactManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps freshly rendered bytes in a new handle. The handle is not live
    /// until installed.
    pub fn acquire(&self, bytes: Bytes, content_type: impl Into<String>) -> ArtifactHandle {
        let handle = ArtifactHandle {
            id: Uuid::new_v4(),
            bytes,
            content_type: content_type.into(),
            created_at: Utc::now(),
        };
        let mut slot = self.slot.lock();
        slot.acquired += 1;
        debug!("Acquired artifact {} ({} bytes)", handle.id, handle.bytes.len());
        handle
    }

    #[cfg(test)]
    pub fn install(&self, handle: ArtifactHandle) -> InstallOutcome {
        self.install_if(handle, || true)
    }

    /// Installs `handle` if `accept` returns true, evaluated under the slot
    /// lock. The previous handle is released after the new one is in place.
    pub fn install_if(
        &self,
        handle: ArtifactHandle,
        accept: impl FnOnce() -> bool,
    ) -> InstallOutcome {
        let mut slot = self.slot.lock();
        if slot.closed {
            slot.release(handle);
            return InstallOutcome::Closed;
        }
        if !accept() {
            slot.release(handle);
            return InstallOutcome::Rejected;
        }

        let id = handle.id;
        let previous = slot.current.replace(handle);
        let replaced = previous.map(|old| {
            let old_id = old.id;
            slot.release(old);
            old_id
        });
        debug!("Installed artifact {id} (replaced {replaced:?})");
        InstallOutcome::Installed { replaced }
    }

    /// Releases the live handle, if any, and closes the manager. Safe to call
    /// more than once.
    pub fn release_all(&self) -> Option<Uuid> {
        let mut slot = self.slot.lock();
        slot.closed = true;
        let current = slot.current.take()?;
        let id = current.id;
        slot.release(current);
        Some(id)
    }

    pub fn current(&self) -> Option<ArtifactSnapshot> {
        self.slot.lock().current.as_ref().map(ArtifactHandle::snapshot)
    }

    pub fn info(&self) -> Option<ArtifactInfo> {
        self.slot.lock().current.as_ref().map(ArtifactHandle::info)
    }

    /// Looks up a handle by id. Only the live handle resolves.
    pub fn resolve(&self, id: Uuid) -> Option<ArtifactSnapshot> {
        self.slot
            .lock()
            .current
            .as_ref()
            .filter(|h| h.id == id)
            .map(ArtifactHandle::snapshot)
    }

    pub fn counters(&self) -> ArtifactCounters {
        let slot = self.slot.lock();
        ArtifactCounters {
            acquired: slot.acquired,
            released: slot.released,
            live: slot.current.is_some(),
        }
    }
}
