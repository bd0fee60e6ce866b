//! Single-writer, multi-reader circular item buffers.
//!
//! A [`Buffer`] is a fixed-capacity circular store of fixed-size items. Exactly
//! one writer produces into it; any number of [`BufferReader`]s consume from
//! it, each with its own cursor. The buffer tracks every attached reader so the
//! writer never overwrites data the slowest reader has not seen.
//!
//! # Indices and counters
//!
//! - `write_index` / `read_index` are physical item positions in
//!   `[0, capacity)` and wrap.
//! - `total_written` / `total_read` count items since the stream started and
//!   never wrap. Tag offsets live in this space.
//!
//! # Locking
//!
//! All shared state (data, write index, tags and every reader cursor) sits
//! behind one mutex per buffer. Every mutation (`post_write`, `post_read`,
//! realignment) and every availability query takes it, so comparisons between
//! the writer and the slowest reader are always consistent. Readers keep their
//! private counters behind their own lock.
//!
//! # Implementations
//!
//! [`BufferKind`] is the closed set of storage strategies. The only one provided
//! is [`BufferKind::SinglyMapped`]: one contiguous allocation that relies on
//! explicit data realignment instead of a double-mapped region.
//!
//! # Contract violations
//!
//! Posting more items than were reported available, on either side, is a bug
//! in the caller and panics. Backpressure itself is never an error: callers
//! observe it through [`space_available`](Buffer::space_available) and
//! [`BufferReader::items_available`].

pub mod item;
pub mod properties;
pub mod reader;
pub mod singly_mapped;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::context::{BufferId, RuntimeContext};
use crate::tag::{Tag, TagStore, TagValue};

pub use item::{Item, decode_items, encode_items};
pub use properties::{BufferFactory, BufferProperties, DEFAULT_BUFFER_BYTES, ReaderFactory};
pub use reader::{BufferReader, ReadInfo, ReaderId, ReaderStats};

/// Errors raised while constructing buffers and readers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Items must be at least one byte.
    #[error("item size must be non-zero")]
    ZeroItemSize,

    /// The resolved capacity was zero.
    #[error("buffer capacity must be non-zero")]
    ZeroCapacity,

    /// A `min_*` knob exceeds its `max_*` counterpart.
    #[error("min_{name} ({min}) exceeds max_{name} ({max})")]
    InvalidBounds {
        /// Knob family, e.g. `buffer_size`.
        name: &'static str,
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A `min_*` floor can never be met by the buffer it applies to.
    #[error("min_{name} ({min}) exceeds the {limit} items the buffer can offer")]
    UnsatisfiableFloor {
        /// Knob family, `buffer_fill` or `buffer_read`.
        name: &'static str,
        /// Configured minimum.
        min: usize,
        /// Largest per-call grant the buffer can ever make.
        limit: usize,
    },

    /// A reader was attached with a different item size than the buffer.
    #[error("reader item size {actual} does not match buffer item size {expected}")]
    ItemSizeMismatch {
        /// Buffer item size.
        expected: usize,
        /// Requested reader item size.
        actual: usize,
    },

    /// A reader asked for more history than the buffer holds contiguously.
    #[error("reader history of {requested} items exceeds the {available} items available")]
    HistoryUnavailable {
        /// Requested back-offset.
        requested: usize,
        /// Items reachable behind the write cursor.
        available: usize,
    },
}

/// Storage strategy of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BufferKind {
    /// One contiguous region; wrap stalls are resolved by moving data.
    SinglyMapped,
}

/// Snapshot returned by [`Buffer::write_info`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteInfo {
    /// Items the writer may produce in this call.
    pub n_items: usize,
    /// Bytes per item.
    pub item_size: usize,
    /// Items written since the stream started.
    pub total_written: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReaderCursor {
    pub read_index: usize,
    pub total_read: u64,
}

pub(crate) struct BufferState {
    pub data: Vec<u8>,
    pub write_index: usize,
    pub total_written: u64,
    pub tags: TagStore,
    pub readers: BTreeMap<ReaderId, ReaderCursor>,
}

impl BufferState {
    /// The reader that has consumed the fewest items.
    pub fn slowest_reader(&self) -> Option<ReaderCursor> {
        self.readers
            .values()
            .copied()
            .min_by_key(|cursor| cursor.total_read)
    }

    pub fn cursor(&self, id: ReaderId) -> ReaderCursor {
        self.readers
            .get(&id)
            .copied()
            .unwrap_or_else(|| panic!("reader {id} is not attached to this buffer"))
    }

    pub fn cursor_mut(&mut self, id: ReaderId) -> &mut ReaderCursor {
        self.readers
            .get_mut(&id)
            .unwrap_or_else(|| panic!("reader {id} is not attached to this buffer"))
    }
}

pub(crate) struct BufferShared {
    id: BufferId,
    kind: BufferKind,
    item_size: usize,
    capacity: usize,
    properties: BufferProperties,
    context: Arc<RuntimeContext>,
    next_reader_id: AtomicU64,
    state: Mutex<BufferState>,
}

impl Drop for BufferShared {
    fn drop(&mut self) {
        self.context
            .buffer_released(self.capacity * self.item_size);
        #[cfg(feature = "tracing")]
        tracing::debug!("buffer_drop: {} ({})", self.id, self.context.name());
    }
}

/// Handle to a circular item buffer.
///
/// Cloning the handle shares the same buffer. The writer side (`write_info`,
/// `post_write`, tag insertion) must only be driven by one producer.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<BufferShared>,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.shared.id)
            .field("kind", &self.shared.kind)
            .field("item_size", &self.shared.item_size)
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

impl Buffer {
    pub(crate) fn new(
        kind: BufferKind,
        num_items: usize,
        item_size: usize,
        properties: &BufferProperties,
        context: &Arc<RuntimeContext>,
    ) -> Result<Self, BufferError> {
        if item_size == 0 {
            return Err(BufferError::ZeroItemSize);
        }
        if num_items == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        let bytes = num_items * item_size;
        let id = context.buffer_allocated(bytes);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "buffer_new: {id} {kind:?} {num_items} items x {item_size} bytes ({})",
            context.name()
        );
        Ok(Self {
            shared: Arc::new(BufferShared {
                id,
                kind,
                item_size,
                capacity: num_items,
                properties: properties.clone(),
                context: Arc::clone(context),
                next_reader_id: AtomicU64::new(0),
                state: Mutex::new(BufferState {
                    data: vec![0; bytes],
                    write_index: 0,
                    total_written: 0,
                    tags: TagStore::new(),
                    readers: BTreeMap::new(),
                }),
            }),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer identifier.
    pub fn id(&self) -> BufferId {
        self.shared.id
    }

    /// Storage strategy.
    pub fn kind(&self) -> BufferKind {
        self.shared.kind
    }

    /// Bytes per item.
    pub fn item_size(&self) -> usize {
        self.shared.item_size
    }

    /// Capacity in items.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Properties the buffer was built with.
    pub fn properties(&self) -> &BufferProperties {
        &self.shared.properties
    }

    /// Context that owns this buffer's bookkeeping.
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.shared.context
    }

    /// Current physical write position, in items.
    pub fn write_index(&self) -> usize {
        self.lock().write_index
    }

    /// Items written since the stream started.
    pub fn total_written(&self) -> u64 {
        self.lock().total_written
    }

    /// Number of attached readers.
    pub fn reader_count(&self) -> usize {
        self.lock().readers.len()
    }

    /// Items that may be written contiguously at the write position without
    /// overwriting data the slowest reader has not consumed.
    pub fn space_available(&self) -> usize {
        let state = self.lock();
        self.space_available_locked(&state)
    }

    fn space_available_locked(&self, state: &BufferState) -> usize {
        match self.shared.kind {
            BufferKind::SinglyMapped => singly_mapped::space_available(state, self.capacity()),
        }
    }

    /// Capacity minus the slowest reader's backlog, wherever the free room
    /// sits physically. Never less than [`space_available`](Self::space_available).
    pub fn free_items(&self) -> usize {
        let state = self.lock();
        let backlog = state
            .slowest_reader()
            .map_or(0, |slowest| state.total_written - slowest.total_read);
        self.capacity() - backlog as usize
    }

    /// Largest grant a single write call may receive: `max_buffer_fill` when
    /// configured, otherwise half the capacity so realignment always has room.
    pub fn write_limit(&self) -> usize {
        self.properties().write_limit(self.capacity())
    }

    /// Returns how many items the writer may produce now.
    pub fn write_info(&self) -> WriteInfo {
        let state = self.lock();
        let space = self.space_available_locked(&state);
        WriteInfo {
            n_items: space.min(self.write_limit()),
            item_size: self.item_size(),
            total_written: state.total_written,
        }
    }

    /// Runs `f` over the writable region at the write position.
    ///
    /// The slice covers exactly [`space_available`](Self::space_available)
    /// items. Data written here becomes visible to readers after
    /// [`post_write`](Self::post_write).
    pub fn with_write_region<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut state = self.lock();
        let space = self.space_available_locked(&state);
        let start = state.write_index * self.item_size();
        let end = start + space * self.item_size();
        f(&mut state.data[start..end])
    }

    /// Encodes `items` at the write position and commits them.
    ///
    /// Writes at most [`space_available`](Self::space_available) items and
    /// returns how many were written.
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the buffer's item size.
    pub fn push_items<T: Item>(&self, items: &[T]) -> usize {
        assert_eq!(
            T::SIZE,
            self.item_size(),
            "item type size does not match buffer {}",
            self.id()
        );
        let written = self.with_write_region(|region| encode_items(items, region));
        self.post_write(written);
        written
    }

    /// Commits `n` items written at the write position.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`space_available`](Self::space_available): the
    /// writer wrote past the end of the buffer.
    pub fn post_write(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.lock();
        let space = self.space_available_locked(&state);
        assert!(
            n <= space,
            "wrote past end of buffer {}: posted {n} items with {space} available",
            self.id()
        );
        match self.shared.kind {
            BufferKind::SinglyMapped => {
                singly_mapped::advance_writer(&mut state, self.capacity(), n);
            }
        }
    }

    /// Called when the writer cannot get enough contiguous space.
    ///
    /// May compact unread data toward the front of the region. Without
    /// `force`, compaction only happens when the writer is short of a full
    /// [`write_limit`](Self::write_limit) grant. Returns true if the layout
    /// changed.
    pub fn output_blocked_callback(&self, force: bool) -> bool {
        let mut state = self.lock();
        if !force && self.space_available_locked(&state) >= self.write_limit() {
            return false;
        }
        let moved = match self.shared.kind {
            BufferKind::SinglyMapped => {
                singly_mapped::realign_for_writer(&mut state, self.capacity(), self.item_size())
            }
        };
        #[cfg(feature = "tracing")]
        if moved {
            tracing::debug!(
                "buffer_realign_out: {} write_index now {}",
                self.id(),
                state.write_index
            );
        } else {
            tracing::trace!("buffer_realign_out: {} no progress", self.id());
        }
        moved
    }

    /// Attaches a new reader starting `history` items behind the writer.
    ///
    /// # Errors
    ///
    /// Fails if `item_size` differs from the buffer's or if `history` exceeds
    /// the data reachable behind the write position.
    pub fn add_reader(
        &self,
        properties: &BufferProperties,
        item_size: usize,
        history: usize,
    ) -> Result<BufferReader, BufferError> {
        properties.create_reader(self, item_size, history)
    }

    pub(crate) fn attach_cursor(&self, history: usize) -> Result<ReaderId, BufferError> {
        let mut state = self.lock();
        let reachable = state
            .write_index
            .min(usize::try_from(state.total_written).unwrap_or(usize::MAX));
        if history > reachable {
            return Err(BufferError::HistoryUnavailable {
                requested: history,
                available: reachable,
            });
        }
        let id = ReaderId(self.shared.next_reader_id.fetch_add(1, Ordering::Relaxed));
        let cursor = ReaderCursor {
            read_index: state.write_index - history,
            total_read: state.total_written - history as u64,
        };
        state.readers.insert(id, cursor);
        self.context().reader_attached();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "reader_attach: {} -> {} at index {} (history {history})",
            id,
            self.id(),
            cursor.read_index
        );
        Ok(id)
    }

    pub(crate) fn detach_cursor(&self, id: ReaderId) {
        if self.lock().readers.remove(&id).is_some() {
            self.context().reader_detached();
            #[cfg(feature = "tracing")]
            tracing::debug!("reader_detach: {} from {}", id, self.id());
        }
    }

    /// Records a tag. No de-duplication is performed.
    pub fn add_tag(&self, tag: Tag) {
        self.lock().tags.insert(tag);
    }

    /// Records a tag built from its parts.
    pub fn add_tag_at(&self, offset: u64, key: impl Into<String>, value: impl Into<TagValue>) {
        self.add_tag(Tag::new(offset, key, value));
    }

    /// Snapshot of every stored tag in offset order.
    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.iter().cloned().collect()
    }

    /// Tags with absolute offsets in `[start, end)`.
    pub fn tags_in_window(&self, start: u64, end: u64) -> Vec<Tag> {
        self.lock().tags.in_window(start, end)
    }

    /// Number of stored tags.
    pub fn tag_count(&self) -> usize {
        self.lock().tags.len()
    }

    /// Drops tags every reader has moved past. Returns how many were removed.
    ///
    /// With no readers attached nothing is pruned: a reader attached later
    /// with history may still need them.
    pub fn prune_tags(&self) -> usize {
        let mut state = self.lock();
        let Some(min_read) = state.readers.values().map(|c| c.total_read).min() else {
            return 0;
        };
        state.tags.prune_below(min_read)
    }

    /// Copies the tags `source` is about to consume (its next `n_consumed`
    /// items) into this buffer, re-based so each tag keeps its distance from
    /// the start of the consumed window relative to this buffer's
    /// `total_written`.
    pub fn propagate_tags(&self, source: &BufferReader, n_consumed: usize) {
        let (window_start, tags) = source.window_tags(n_consumed);
        if tags.is_empty() {
            return;
        }
        let mut state = self.lock();
        let base = state.total_written;
        for tag in tags {
            let offset = tag.offset() - window_start + base;
            state.tags.insert(tag.with_offset(offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(items: usize) -> (Arc<RuntimeContext>, Buffer) {
        let ctx = RuntimeContext::new("test");
        let buf = BufferProperties::new()
            .with_buffer_size(items)
            .create_buffer(4, &ctx)
            .unwrap();
        (ctx, buf)
    }

    #[test]
    fn writer_without_readers_wraps_freely() {
        let (_ctx, buf) = buffer(8);
        assert_eq!(buf.space_available(), 8);
        assert_eq!(buf.push_items(&[1u32; 8]), 8);
        assert_eq!(buf.write_index(), 0);
        assert_eq!(buf.total_written(), 8);
        assert_eq!(buf.space_available(), 8);
    }

    #[test]
    fn write_info_is_capped_at_half_capacity() {
        let (_ctx, buf) = buffer(1024);
        let _reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        assert_eq!(buf.space_available(), 1024);
        assert_eq!(buf.write_info().n_items, 512);
    }

    #[test]
    fn write_info_honours_max_buffer_fill() {
        let ctx = RuntimeContext::new("fill");
        let buf = BufferProperties::new()
            .with_buffer_size(1024)
            .with_max_buffer_fill(100)
            .create_buffer(4, &ctx)
            .unwrap();
        assert_eq!(buf.write_info().n_items, 100);
    }

    #[test]
    #[should_panic(expected = "wrote past end of buffer")]
    fn post_write_past_space_panics() {
        let (_ctx, buf) = buffer(16);
        let _reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.post_write(17);
    }

    #[test]
    fn reader_lifecycle_is_tracked() {
        let (ctx, buf) = buffer(16);
        let a = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        let b = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        assert_eq!(buf.reader_count(), 2);
        assert_eq!(ctx.live_readers(), 2);
        drop(a);
        assert_eq!(buf.reader_count(), 1);
        drop(b);
        assert_eq!(ctx.live_readers(), 0);
    }

    #[test]
    fn reader_item_size_must_match() {
        let (_ctx, buf) = buffer(16);
        let err = buf.add_reader(&BufferProperties::new(), 8, 0).unwrap_err();
        assert_eq!(
            err,
            BufferError::ItemSizeMismatch {
                expected: 4,
                actual: 8
            }
        );
    }

    #[test]
    fn history_beyond_written_data_is_rejected() {
        let (_ctx, buf) = buffer(16);
        buf.push_items(&[0u32; 4]);
        let err = buf.add_reader(&BufferProperties::new(), 4, 5).unwrap_err();
        assert_eq!(
            err,
            BufferError::HistoryUnavailable {
                requested: 5,
                available: 4
            }
        );

        let reader = buf.add_reader(&BufferProperties::new(), 4, 3).unwrap();
        assert_eq!(reader.items_available(), 3);
        assert_eq!(reader.total_read(), 1);
    }

    #[test]
    fn prune_without_readers_keeps_tags() {
        let (_ctx, buf) = buffer(16);
        buf.add_tag_at(0, "sob", true);
        assert_eq!(buf.prune_tags(), 0);
        assert_eq!(buf.tag_count(), 1);
    }

    #[test]
    fn prune_waits_for_slowest_reader() {
        let (_ctx, buf) = buffer(16);
        let fast = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        let slow = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.add_tag_at(2, "a", 1i64);
        buf.add_tag_at(6, "b", 2i64);
        buf.push_items(&[0u32; 8]);

        fast.post_read(8);
        assert_eq!(buf.prune_tags(), 0);

        slow.post_read(4);
        assert_eq!(buf.prune_tags(), 1);
        assert_eq!(buf.tags()[0].key(), "b");
    }

    #[test]
    fn buffer_bytes_are_released_on_drop() {
        let (ctx, buf) = buffer(32);
        assert_eq!(ctx.allocated_bytes(), 128);
        let clone = buf.clone();
        drop(buf);
        assert_eq!(ctx.live_buffers(), 1);
        drop(clone);
        assert_eq!(ctx.live_buffers(), 0);
        assert_eq!(ctx.allocated_bytes(), 0);
    }
}
