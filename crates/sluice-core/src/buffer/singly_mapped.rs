//! Singly-mapped buffer: one contiguous region, explicit realignment.
//!
//! A circular buffer kept in a single allocation has a physical end. Writers
//! and readers never wrap mid-call: availability is always reported up to the
//! end of the region, and a cursor that lands exactly on the end moves to 0.
//!
//! When a cursor stalls against the end while usable room exists at the front,
//! the data is moved instead of relying on a double-mapped region:
//!
//! - [`realign_for_writer`] moves the unread span `[min_read, write)` down to
//!   offset 0 so the writer gets the whole tail back.
//! - [`realign_for_reader`] handles a reader stranded in the pre-wrap zone: the
//!   short tail `[min_read, end)` is copied in front of the wrapped head
//!   `[0, write)`, giving the reader one unbroken run.
//!
//! Both run under the buffer mutex and cost O(capacity); they only trigger on
//! wrap stalls.

use std::sync::Arc;

use crate::context::RuntimeContext;

use super::reader::{BufferReader, ReaderId};
use super::{Buffer, BufferError, BufferKind, BufferProperties, BufferState};

/// Default [`BufferFactory`](super::BufferFactory): builds a singly-mapped buffer.
pub fn create_buffer(
    num_items: usize,
    item_size: usize,
    properties: &BufferProperties,
    context: &Arc<RuntimeContext>,
) -> Result<Buffer, BufferError> {
    Buffer::new(
        BufferKind::SinglyMapped,
        num_items,
        item_size,
        properties,
        context,
    )
}

/// Default [`ReaderFactory`](super::ReaderFactory): attaches a reader to a
/// singly-mapped buffer.
pub fn create_reader(
    buffer: &Buffer,
    properties: &BufferProperties,
    item_size: usize,
    history: usize,
) -> Result<BufferReader, BufferError> {
    if item_size != buffer.item_size() {
        return Err(BufferError::ItemSizeMismatch {
            expected: buffer.item_size(),
            actual: item_size,
        });
    }
    properties.check_read_floor(buffer.capacity())?;
    let id = buffer.attach_cursor(history)?;
    Ok(BufferReader::new(buffer.clone(), id, properties.clone(), item_size))
}

/// Contiguous writable items at the write index.
pub(crate) fn space_available(state: &BufferState, capacity: usize) -> usize {
    let write = state.write_index;
    let Some(slowest) = state.slowest_reader() else {
        return capacity - write;
    };
    let read = slowest.read_index;
    if read == write {
        // Equal indices: empty if everything written was read, otherwise full.
        if slowest.total_read == state.total_written {
            capacity - write
        } else {
            0
        }
    } else if read > write {
        read - write
    } else {
        capacity - write
    }
}

/// Contiguous readable items for `reader`, stopping at the physical end.
pub(crate) fn items_available(state: &BufferState, capacity: usize, reader: ReaderId) -> usize {
    let cursor = state.cursor(reader);
    let write = state.write_index;
    let read = cursor.read_index;
    if write > read {
        write - read
    } else if read > write || cursor.total_read < state.total_written {
        capacity - read
    } else {
        0
    }
}

pub(crate) fn advance_writer(state: &mut BufferState, capacity: usize, n: usize) {
    let next = state.write_index + n;
    assert!(
        next <= capacity,
        "write index {next} beyond buffer of {capacity} items"
    );
    state.write_index = if next == capacity { 0 } else { next };
    state.total_written += n as u64;
}

pub(crate) fn advance_reader(state: &mut BufferState, capacity: usize, reader: ReaderId, n: usize) {
    let available = items_available(state, capacity, reader);
    assert!(
        n <= available,
        "reader {reader} read past available data: posted {n} items with {available} available"
    );
    let cursor = state.cursor_mut(reader);
    let next = cursor.read_index + n;
    assert!(
        next <= capacity,
        "read index {next} beyond buffer of {capacity} items"
    );
    cursor.read_index = if next == capacity { 0 } else { next };
    cursor.total_read += n as u64;
    debug_assert!(cursor.total_read <= state.total_written);
}

/// Moves unread data to the front so a stalled writer regains the tail.
///
/// The slowest reader's index is the lower bound of unread data. Refuses when
/// nothing sits in front of it, when it is at or ahead of the writer (wrapped),
/// or when the span to move is longer than the room freed in front. Every
/// reader index is shifted down by the same amount as the data.
///
/// When every reader has consumed everything, nothing needs moving and all
/// cursors rewind to 0.
pub(crate) fn realign_for_writer(
    state: &mut BufferState,
    capacity: usize,
    item_size: usize,
) -> bool {
    let write = state.write_index;
    let Some(slowest) = state.slowest_reader() else {
        if write == 0 {
            return false;
        }
        state.write_index = 0;
        return true;
    };

    if slowest.total_read == state.total_written {
        if write == 0 {
            return false;
        }
        state.write_index = 0;
        for cursor in state.readers.values_mut() {
            cursor.read_index = 0;
        }
        return true;
    }

    let min_read = slowest.read_index;
    if min_read == 0 || min_read >= write {
        return false;
    }
    let to_move = write - min_read;
    if to_move > min_read {
        return false;
    }
    debug_assert!(write <= capacity);

    state
        .data
        .copy_within(min_read * item_size..write * item_size, 0);
    state.write_index = to_move;
    for cursor in state.readers.values_mut() {
        cursor.read_index -= min_read;
    }
    true
}

/// Rebuilds one unbroken run for a reader stranded before the physical end.
///
/// Only applies when `reader` sits ahead of the writer (the writer already
/// wrapped) and fewer than `items_required` items remain before the end.
/// Among readers ahead of the writer, the smallest index marks the start of
/// the tail `[min_read, end)`. The wrapped head `[0, write)` is shifted up by
/// the tail length and the tail copied in front of it, which requires the
/// tail to fit in the gap between the writer and `min_read`.
///
/// Readers ahead of the writer move down by `min_read`; readers at or behind
/// the writer move up by the tail length, as does the writer.
pub(crate) fn realign_for_reader(
    state: &mut BufferState,
    capacity: usize,
    item_size: usize,
    reader: ReaderId,
    items_required: usize,
) -> bool {
    let write = state.write_index;
    let read = state.cursor(reader).read_index;
    if read <= write || capacity - read >= items_required {
        return false;
    }
    // A reader a full lap behind still needs every byte of the region.
    let full_lap = state
        .readers
        .values()
        .any(|c| c.read_index == write && c.total_read < state.total_written);
    if full_lap {
        return false;
    }

    let Some(min_read) = state
        .readers
        .values()
        .map(|c| c.read_index)
        .filter(|&idx| idx > write)
        .min()
    else {
        return false;
    };

    let tail = capacity - min_read;
    let gap = min_read - write;
    if write > min_read || tail > gap {
        return false;
    }

    state
        .data
        .copy_within(0..write * item_size, tail * item_size);
    state
        .data
        .copy_within(min_read * item_size..capacity * item_size, 0);

    for cursor in state.readers.values_mut() {
        if cursor.read_index > write {
            cursor.read_index -= min_read;
        } else {
            cursor.read_index += tail;
        }
    }
    state.write_index += tail;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferProperties, decode_items};

    fn ramp(start: u32, len: usize) -> Vec<u32> {
        (start..start + len as u32).collect()
    }

    fn buffer(items: usize) -> Buffer {
        let ctx = RuntimeContext::new("sm");
        BufferProperties::new()
            .with_buffer_size(items)
            .create_buffer(4, &ctx)
            .unwrap()
    }

    #[test]
    fn full_and_empty_are_distinguished_at_equal_indices() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();

        assert_eq!(buf.space_available(), 8);
        assert_eq!(reader.items_available(), 0);

        buf.push_items(&ramp(0, 8));
        assert_eq!(buf.write_index(), 0);
        assert_eq!(reader.read_index(), 0);
        assert_eq!(buf.space_available(), 0);
        assert_eq!(reader.items_available(), 8);

        reader.post_read(8);
        assert_eq!(buf.space_available(), 8);
        assert_eq!(reader.items_available(), 0);
    }

    #[test]
    fn reader_availability_stops_at_physical_end() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(0, 6));
        reader.post_read(5);
        buf.push_items(&ramp(6, 2)); // writer wraps to 0
        buf.push_items(&ramp(8, 3));

        assert_eq!(buf.write_index(), 3);
        // Reader at 5 sees only [5, 8) until it wraps.
        assert_eq!(reader.items_available(), 3);
        reader.post_read(3);
        assert_eq!(reader.read_index(), 0);
        assert_eq!(reader.items_available(), 3);
        assert_eq!(reader.read_items::<u32>(3), vec![8, 9, 10]);
    }

    #[test]
    fn writer_realignment_rewinds_empty_buffer() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(0, 7));
        reader.post_read(7);
        assert_eq!(buf.space_available(), 1);

        assert!(buf.output_blocked_callback(false));
        assert_eq!(buf.write_index(), 0);
        assert_eq!(reader.read_index(), 0);
        assert_eq!(buf.space_available(), 8);
        assert_eq!(reader.items_available(), 0);
    }

    #[test]
    fn writer_realignment_refuses_overlapping_move() {
        let buf = buffer(16);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(0, 8));
        buf.push_items(&ramp(8, 7));
        reader.post_read(4);
        // to_move = 11 > min_read = 4
        assert!(!buf.output_blocked_callback(true));
        assert_eq!(buf.write_index(), 15);
    }

    #[test]
    fn writer_realignment_refuses_wrapped_reader() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(0, 8));
        reader.post_read(6);
        buf.push_items(&ramp(8, 2));
        assert_eq!(buf.write_index(), 2);
        assert!(!buf.output_blocked_callback(true));
    }

    #[test]
    fn reader_realignment_joins_tail_and_head() {
        let buf = buffer(16);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();

        buf.push_items(&ramp(0, 8));
        buf.push_items(&ramp(8, 8)); // wraps
        reader.post_read(14); // two items left before the end
        buf.push_items(&ramp(16, 4)); // head [0, 4)

        assert_eq!(reader.items_available(), 2);
        assert!(!reader.input_blocked_callback(2));
        assert!(reader.input_blocked_callback(5));

        assert_eq!(reader.read_index(), 0);
        assert_eq!(buf.write_index(), 6);
        assert_eq!(reader.items_available(), 6);
        assert_eq!(reader.read_items::<u32>(6), ramp(14, 6));
        assert_eq!(reader.total_read(), 14);
        assert_eq!(buf.total_written(), 20);
    }

    #[test]
    fn reader_realignment_refuses_when_tail_exceeds_gap() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(0, 8));
        reader.post_read(4);
        buf.push_items(&ramp(8, 2));
        // tail = 4, gap = 4 - 2 = 2
        assert!(!reader.input_blocked_callback(6));
        assert_eq!(reader.read_index(), 4);
    }

    #[test]
    fn reader_realignment_moves_caught_up_readers_with_writer() {
        let buf = buffer(16);
        let slow = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        let fast = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();

        buf.push_items(&ramp(0, 8));
        buf.push_items(&ramp(8, 8));
        slow.post_read(15);
        fast.post_read(16);
        buf.push_items(&ramp(16, 3));
        fast.post_read(2);

        assert!(slow.input_blocked_callback(4));
        assert_eq!(slow.read_index(), 0);
        assert_eq!(fast.read_index(), 3);
        assert_eq!(buf.write_index(), 4);
        assert_eq!(slow.read_items::<u32>(4), ramp(15, 4));
        assert_eq!(fast.read_items::<u32>(1), vec![18]);
    }

    #[test]
    fn reader_floor_is_checked_against_existing_buffer() {
        let buf = buffer(32);
        let picky = BufferProperties::new().with_min_buffer_read(33);
        assert_eq!(
            buf.add_reader(&picky, 4, 0).unwrap_err(),
            BufferError::UnsatisfiableFloor {
                name: "buffer_read",
                min: 33,
                limit: 32
            }
        );
        assert_eq!(buf.reader_count(), 0);
        buf.add_reader(&picky.with_min_buffer_read(32), 4, 0).unwrap();
    }

    #[test]
    fn region_views_match_indices() {
        let buf = buffer(8);
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.push_items(&ramp(100, 3));
        let seen = reader.with_read_region(decode_items::<u32>);
        assert_eq!(seen, vec![100, 101, 102]);
        let room = buf.with_write_region(|region| region.len());
        assert_eq!(room, 5 * 4);
    }
}
