//! Neighbor notification hooks.
//!
//! After committing a block's work the executor tells the blocks on the other
//! end of each touched buffer that their situation may have changed. What a
//! notification does is up to the scheduler above the executor; the executor
//! only guarantees at-least-once delivery per state change.

use std::sync::{Arc, Mutex, PoisonError};

use crate::block::BlockId;

/// What changed for the notified block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Notification {
    /// New items were written to one of the block's inputs.
    Input,
    /// Items were consumed from one of the block's outputs, freeing space.
    Output,
}

/// Receiver of neighbor notifications.
pub trait Notify: Send + Sync {
    /// Called once per touched neighbor after a commit.
    fn notify(&self, target: BlockId, notification: Notification);
}

/// Discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notify for NullNotifier {
    fn notify(&self, _target: BlockId, _notification: Notification) {}
}

/// Records notifications in order. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    log: Arc<Mutex<Vec<(BlockId, Notification)>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<(BlockId, Notification)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<(BlockId, Notification)> {
        core::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of notifications of `kind` sent to `target`.
    pub fn count(&self, target: BlockId, kind: Notification) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, n)| *id == target && *n == kind)
            .count()
    }
}

impl Notify for RecordingNotifier {
    fn notify(&self, target: BlockId, notification: Notification) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((target, notification));
    }
}
