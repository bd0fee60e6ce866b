//! Per-pipeline runtime context.
//!
//! A [`RuntimeContext`] is created once per pipeline and handed to every buffer
//! constructor. It replaces process-wide counters: buffer ids, live
//! buffer/reader counts and allocated bytes all live here, so two pipelines in
//! the same process never share bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Unique identifier of a buffer within one [`RuntimeContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u64);

impl BufferId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

/// Shared bookkeeping for all buffers of one pipeline.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    name: String,
    next_buffer_id: AtomicU64,
    live_buffers: AtomicUsize,
    live_readers: AtomicUsize,
    allocated_bytes: AtomicUsize,
}

impl RuntimeContext {
    /// Creates a named context.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ..Self::default()
        })
    }

    /// Pipeline name, used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Relaxed)
    }

    /// Number of readers currently attached to live buffers.
    pub fn live_readers(&self) -> usize {
        self.live_readers.load(Ordering::Relaxed)
    }

    /// Bytes of sample storage currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn buffer_allocated(&self, bytes: usize) -> BufferId {
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(bytes, Ordering::Relaxed);
        BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn buffer_released(&self, bytes: usize) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub(crate) fn reader_attached(&self) {
        self.live_readers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reader_detached(&self) {
        self.live_readers.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_per_context() {
        let a = RuntimeContext::new("a");
        let b = RuntimeContext::new("b");

        assert_eq!(a.buffer_allocated(16).index(), 0);
        assert_eq!(a.buffer_allocated(16).index(), 1);
        assert_eq!(b.buffer_allocated(16).index(), 0);

        assert_eq!(a.live_buffers(), 2);
        assert_eq!(a.allocated_bytes(), 32);
        a.buffer_released(16);
        assert_eq!(a.live_buffers(), 1);
        assert_eq!(a.allocated_bytes(), 16);
        assert_eq!(b.live_buffers(), 1);
    }
}
