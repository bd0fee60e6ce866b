//! Independent read cursors into a [`Buffer`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::tag::Tag;

use super::item::{Item, decode_items};
use super::{Buffer, BufferKind, BufferProperties, singly_mapped};

/// Identifier of a reader within its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub(crate) u64);

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReaderId({})", self.0)
    }
}

/// Snapshot returned by [`BufferReader::read_info`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadInfo {
    /// Items readable contiguously right now.
    pub n_items: usize,
    /// Bytes per item.
    pub item_size: usize,
    /// Items consumed since the stream started.
    pub total_read: u64,
}

/// Per-reader counters that never touch the buffer lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Number of `input_blocked_callback` invocations.
    pub blocked_callbacks: u64,
    /// Number of those that realigned the buffer.
    pub realignments: u64,
}

/// One cursor into a buffer.
///
/// The cursor lives inside the buffer's shared state so the writer can see
/// it; dropping the reader detaches it. Reads never wrap inside one call:
/// [`items_available`](Self::items_available) stops at the physical end of
/// the region, so re-check after every [`post_read`](Self::post_read).
pub struct BufferReader {
    buffer: Buffer,
    id: ReaderId,
    properties: BufferProperties,
    item_size: usize,
    stats: Mutex<ReaderStats>,
}

impl fmt::Debug for BufferReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferReader")
            .field("id", &self.id)
            .field("buffer", &self.buffer.id())
            .field("item_size", &self.item_size)
            .finish_non_exhaustive()
    }
}

impl BufferReader {
    pub(crate) fn new(
        buffer: Buffer,
        id: ReaderId,
        properties: BufferProperties,
        item_size: usize,
    ) -> Self {
        Self {
            buffer,
            id,
            properties,
            item_size,
            stats: Mutex::new(ReaderStats::default()),
        }
    }

    /// Reader identifier within its buffer.
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// The buffer this reader consumes from.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Properties the reader was attached with.
    pub fn properties(&self) -> &BufferProperties {
        &self.properties
    }

    /// Bytes per item.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Current physical read position, in items.
    pub fn read_index(&self) -> usize {
        self.buffer.lock().cursor(self.id).read_index
    }

    /// Items consumed since the stream started.
    pub fn total_read(&self) -> u64 {
        self.buffer.lock().cursor(self.id).total_read
    }

    /// Local counters.
    pub fn stats(&self) -> ReaderStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Items readable contiguously without wrapping.
    ///
    /// May be less than `total_written - total_read` when the cursor is close
    /// to the physical end of the region.
    pub fn items_available(&self) -> usize {
        let state = self.buffer.lock();
        self.items_available_locked(&state)
    }

    fn items_available_locked(&self, state: &super::BufferState) -> usize {
        match self.buffer.kind() {
            BufferKind::SinglyMapped => {
                singly_mapped::items_available(state, self.buffer.capacity(), self.id)
            }
        }
    }

    /// Returns how many items may be consumed now.
    pub fn read_info(&self) -> ReadInfo {
        let state = self.buffer.lock();
        ReadInfo {
            n_items: self.items_available_locked(&state),
            item_size: self.item_size,
            total_read: state.cursor(self.id).total_read,
        }
    }

    /// Runs `f` over the readable region at the read position.
    pub fn with_read_region<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let state = self.buffer.lock();
        let available = self.items_available_locked(&state);
        let start = state.cursor(self.id).read_index * self.item_size;
        let end = start + available * self.item_size;
        f(&state.data[start..end])
    }

    /// Decodes up to `n` items at the read position without consuming them.
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the reader's item size.
    pub fn read_items<T: Item>(&self, n: usize) -> Vec<T> {
        assert_eq!(
            T::SIZE,
            self.item_size,
            "item type size does not match reader {}",
            self.id
        );
        self.with_read_region(|region| {
            let len = region.len().min(n * self.item_size);
            decode_items(&region[..len])
        })
    }

    /// Consumes `n` items.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`items_available`](Self::items_available) or the
    /// read index would move past the end of the region.
    pub fn post_read(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.buffer.lock();
        match self.buffer.kind() {
            BufferKind::SinglyMapped => {
                singly_mapped::advance_reader(&mut state, self.buffer.capacity(), self.id, n);
            }
        }
    }

    /// Called when fewer than `items_required` items are contiguously
    /// readable. May realign the buffer so the data past the wrap point
    /// becomes reachable. Returns true if the layout changed.
    pub fn input_blocked_callback(&self, items_required: usize) -> bool {
        let moved = {
            let mut state = self.buffer.lock();
            match self.buffer.kind() {
                BufferKind::SinglyMapped => singly_mapped::realign_for_reader(
                    &mut state,
                    self.buffer.capacity(),
                    self.buffer.item_size(),
                    self.id,
                    items_required,
                ),
            }
        };

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.blocked_callbacks += 1;
        if moved {
            stats.realignments += 1;
        }
        #[cfg(feature = "tracing")]
        if moved {
            tracing::debug!(
                "buffer_realign_in: {} for {} ({items_required} items required)",
                self.buffer.id(),
                self.id
            );
        }
        moved
    }

    /// Tags attached to the next `n` items, i.e. the window
    /// `[total_read, total_read + n)`.
    pub fn get_tags(&self, n: usize) -> Vec<Tag> {
        self.window_tags(n).1
    }

    /// Tags in `[total_read + start, total_read + end)`.
    pub fn tags_in_window(&self, start: u64, end: u64) -> Vec<Tag> {
        let state = self.buffer.lock();
        let base = state.cursor(self.id).total_read;
        state.tags.in_window(base + start, base + end)
    }

    /// `total_read` together with the tags of the next `n` items, observed
    /// under one lock.
    pub(crate) fn window_tags(&self, n: usize) -> (u64, Vec<Tag>) {
        let state = self.buffer.lock();
        let base = state.cursor(self.id).total_read;
        (base, state.tags.in_window(base, base + n as u64))
    }
}

impl Drop for BufferReader {
    fn drop(&mut self) {
        self.buffer.detach_cursor(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuntimeContext;

    fn buffer(items: usize) -> Buffer {
        let ctx = RuntimeContext::new("reader");
        BufferProperties::new()
            .with_buffer_size(items)
            .create_buffer(4, &ctx)
            .unwrap()
    }

    #[test]
    fn readers_advance_independently() {
        let buf = buffer(64);
        let a = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        let b = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&[7u32; 32]);

        a.post_read(20);
        assert_eq!(a.items_available(), 12);
        assert_eq!(b.items_available(), 32);
        assert_eq!(a.read_info().total_read, 20);
        assert_eq!(b.read_info().total_read, 0);
    }

    #[test]
    #[should_panic(expected = "read past available data")]
    fn post_read_past_available_panics() {
        let buf = buffer(16);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&[1u32; 4]);
        reader.post_read(5);
    }

    #[test]
    fn get_tags_covers_the_next_window() {
        let buf = buffer(64);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        for offset in [0u64, 5, 10, 15] {
            buf.add_tag_at(offset, "mark", offset);
        }
        buf.push_items(&[0u32; 20]);

        let offsets: Vec<_> = reader.get_tags(10).iter().map(Tag::offset).collect();
        assert_eq!(offsets, vec![0, 5]);

        reader.post_read(10);
        let offsets: Vec<_> = reader.get_tags(10).iter().map(Tag::offset).collect();
        assert_eq!(offsets, vec![10, 15]);

        let relative: Vec<_> = reader
            .tags_in_window(4, 6)
            .iter()
            .map(Tag::offset)
            .collect();
        assert_eq!(relative, vec![15]);
    }

    #[test]
    fn blocked_callback_updates_local_stats() {
        let buf = buffer(16);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        assert!(!reader.input_blocked_callback(4));
        assert_eq!(
            reader.stats(),
            ReaderStats {
                blocked_callbacks: 1,
                realignments: 0
            }
        );
    }
}
