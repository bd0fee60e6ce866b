//! Integration tests for sluice-core buffers and the executor.
//!
//! Covers cross-module behavior: the capacity arithmetic of a default-sized
//! buffer, writer and reader realignment with data checks, two readers at
//! different speeds on one buffer, tag travel through a pipeline, and the
//! executor's shrink-and-retry loop for batch-producing blocks.

use std::sync::{Arc, Mutex};

use sluice_core::blocks::{MultiplyConst, NullSink, NullSource, VectorSink, VectorSource};
use sluice_core::{
    Block, BlockId, Buffer, BufferProperties, BufferReader, ExecutionState, Graph, GraphExecutor,
    PortSignature, PortSpec, RuntimeContext, Tag, TagPropagationPolicy, WorkIo, WorkReturnCode,
};

fn buffer(items: usize) -> Buffer {
    BufferProperties::new()
        .with_buffer_size(items)
        .create_buffer(4, &RuntimeContext::new("integration"))
        .unwrap()
}

fn reader(buf: &Buffer) -> BufferReader {
    buf.add_reader(&BufferProperties::new(), 4, 0).unwrap()
}

fn ramp(start: u32, len: usize) -> Vec<u32> {
    (start..start + len as u32).collect()
}

// ============================================================================
// 1. Capacity arithmetic on a default-sized buffer
// ============================================================================

#[test]
fn default_buffer_fills_in_thousand_item_steps() {
    let ctx = RuntimeContext::new("fill-steps");
    let buf = BufferProperties::new().create_buffer(4, &ctx).unwrap();
    let reader = reader(&buf);

    assert_eq!(buf.capacity(), 16384);
    assert_eq!(buf.space_available(), 16384);

    for _ in 0..16 {
        buf.with_write_region(|region| region[..4000].fill(0xAB));
        buf.post_write(1000);
    }
    assert_eq!(buf.space_available(), 384);
    assert_eq!(reader.items_available(), 16000);
}

#[test]
fn reading_in_steps_frees_space_for_the_writer() {
    let ctx = RuntimeContext::new("read-steps");
    let buf = BufferProperties::new().create_buffer(4, &ctx).unwrap();
    let reader = reader(&buf);
    buf.push_items(&ramp(0, 16000));

    let mut available = reader.items_available();
    let mut free = buf.free_items();
    assert_eq!(available, 16000);
    assert_eq!(free, 384);

    for step in 0..16u32 {
        assert_eq!(reader.read_items::<u32>(1)[0], step * 1000);
        reader.post_read(1000);
        assert_eq!(reader.items_available(), available - 1000);
        assert_eq!(buf.free_items(), free + 1000);
        assert!(buf.space_available() <= buf.free_items());
        available -= 1000;
        free += 1000;
    }
    assert_eq!(buf.free_items(), 16384);
    // Everything consumed: the writer gets the rest of the region back.
    assert_eq!(buf.space_available(), 384);
    assert!(buf.output_blocked_callback(false));
    assert_eq!(buf.space_available(), 16384);
}

#[test]
fn stalled_writer_reclaims_consumed_front() {
    let ctx = RuntimeContext::new("reclaim");
    let buf = BufferProperties::new().create_buffer(4, &ctx).unwrap();
    let reader = reader(&buf);
    buf.push_items(&ramp(0, 16192));
    reader.post_read(8192);

    assert_eq!(buf.space_available(), 192);
    assert!(buf.space_available() < 200);
    assert!(buf.output_blocked_callback(false));
    assert_eq!(buf.space_available(), 8384);
    assert_eq!(buf.write_index(), 8000);
    assert_eq!(reader.read_index(), 0);
    assert_eq!(reader.read_items::<u32>(8000), ramp(8192, 8000));
}

// ============================================================================
// 2. Realignment keeps every byte
// ============================================================================

#[test]
fn writer_realignment_moves_by_slowest_read_index() {
    let buf = buffer(1024);
    let reader = reader(&buf);
    buf.push_items(&ramp(0, 1023));
    reader.post_read(600);
    let before = buf.write_index();

    assert!(buf.output_blocked_callback(true));
    assert_eq!(buf.write_index(), before - 600);
    assert_eq!(reader.items_available(), 423);
    assert_eq!(reader.read_items::<u32>(423), ramp(600, 423));
    assert_eq!(reader.total_read(), 600);
    assert_eq!(buf.total_written(), 1023);
}

#[test]
fn writer_realignment_refuses_overlapping_move() {
    let buf = buffer(1024);
    let reader = reader(&buf);
    buf.push_items(&ramp(0, 1000));
    reader.post_read(300);

    // 700 unread items cannot move into 300 freed slots.
    assert!(!buf.output_blocked_callback(true));
    assert_eq!(buf.write_index(), 1000);
    assert_eq!(reader.read_items::<u32>(700), ramp(300, 700));
}

#[test]
fn reader_realignment_joins_tail_and_head() {
    let buf = buffer(16);
    let reader = reader(&buf);
    buf.push_items(&ramp(0, 12));
    reader.post_read(10);
    buf.push_items(&ramp(12, 4));
    buf.push_items(&ramp(16, 3));
    assert_eq!(buf.write_index(), 3);
    assert_eq!(reader.items_available(), 6);

    assert!(reader.input_blocked_callback(8));
    assert_eq!(reader.read_index(), 0);
    assert_eq!(buf.write_index(), 9);
    assert_eq!(reader.items_available(), 9);
    assert_eq!(reader.read_items::<u32>(9), ramp(10, 9));
    assert_eq!(reader.stats().realignments, 1);
}

// ============================================================================
// 3. Two readers on one buffer
// ============================================================================

#[test]
fn fast_reader_is_not_held_back_by_slow_reader() {
    let buf = buffer(1024);
    let fast = reader(&buf);
    let slow = reader(&buf);
    let mut next = 0u32;

    for _ in 0..400 {
        let chunk = ramp(next, 96);
        let written = buf.push_items(&chunk);
        next += written as u32;
        if written < chunk.len() {
            buf.output_blocked_callback(false);
        }

        // Fast reader drains everything, across the wrap if needed.
        loop {
            let n = fast.items_available();
            if n == 0 {
                break;
            }
            let expected = fast.total_read() as u32;
            assert_eq!(fast.read_items::<u32>(n), ramp(expected, n));
            fast.post_read(n);
        }
        assert_eq!(fast.total_read(), buf.total_written());

        // Slow reader takes half of what it can see.
        let n = slow.items_available().div_ceil(2);
        if n > 0 {
            let expected = slow.total_read() as u32;
            assert_eq!(slow.read_items::<u32>(n), ramp(expected, n));
            slow.post_read(n);
        }

        let backlog = (buf.total_written() - slow.total_read()) as usize;
        assert!(buf.space_available() <= buf.capacity() - backlog);
        assert!(slow.items_available() <= backlog);
        assert!(slow.total_read() <= buf.total_written());
    }
    assert!(slow.total_read() > 0);
    assert!(buf.total_written() > 1024);
}

// ============================================================================
// 4. Tags through a pipeline
// ============================================================================

fn tag_offsets(tags: &[Tag]) -> Vec<u64> {
    tags.iter().map(Tag::offset).collect()
}

#[test]
fn tags_keep_their_offsets_through_a_pipeline() {
    let mut graph = Graph::new(RuntimeContext::new("tags"));
    let src = graph.add_block(Box::new(
        VectorSource::new(vec![1.0f32; 1000])
            .with_tag(0, "sob", true)
            .with_tag(500, "mark", 500u64)
            .with_tag(970, "late", 970u64),
    ));
    let gain = graph.add_block(Box::new(MultiplyConst::new(2.0).with_output_multiple(64)));
    let (sink, handle) = VectorSink::<f32>::new();
    let sink = graph.add_block(Box::new(sink));
    graph.connect(src, 0, gain, 0).unwrap();
    graph.connect(gain, 0, sink, 0).unwrap();
    let mut exec = GraphExecutor::new(graph).unwrap();

    for _ in 0..4 {
        exec.run_one_iteration();
    }

    // 1000 items in, 15 whole batches of 64 out; the last 40 stay behind.
    assert_eq!(handle.len(), 960);
    assert!(handle.items().iter().all(|&x| x == 2.0));
    assert_eq!(tag_offsets(&handle.tags()), vec![0, 500]);
    assert_eq!(handle.tags()[1].key(), "mark");

    let states = exec.run_one_iteration();
    assert_eq!(states[&src], ExecutionState::Done);
    assert_eq!(states[&gain], ExecutionState::BlockedIn);
    assert_eq!(states[&sink], ExecutionState::BlockedIn);
}

#[test]
fn repeating_source_tags_every_pass() {
    let mut graph = Graph::new(RuntimeContext::new("repeat"))
        .with_buffer_properties(BufferProperties::new().with_buffer_size(64));
    let src = graph.add_block(Box::new(
        VectorSource::new(vec![7u32; 10])
            .with_repeat(true)
            .with_tag(0, "pass", true),
    ));
    let (sink, handle) = VectorSink::<u32>::new();
    let sink = graph.add_block(Box::new(sink));
    graph.connect(src, 0, sink, 0).unwrap();
    let mut exec = GraphExecutor::new(graph).unwrap();

    while handle.len() < 100 {
        exec.run_one_iteration();
    }
    let offsets = tag_offsets(&handle.tags());
    assert!(offsets.len() >= 10);
    assert!(offsets.iter().all(|offset| offset % 10 == 0));
}

/// Copies input `i` to output `i` for two lanes.
struct Lanes;

impl Block for Lanes {
    fn alias(&self) -> &str {
        "lanes"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(
            vec![PortSpec::of::<u32>("a"), PortSpec::of::<u32>("b")],
            vec![PortSpec::of::<u32>("a"), PortSpec::of::<u32>("b")],
        )
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        for lane in 0..2 {
            let (input, output) = io.pair(lane, lane);
            let n = input.n_items().min(output.remaining());
            let items = input.items::<u32>();
            output.write(&items[..n]);
            input.consume(n);
        }
        WorkReturnCode::Ok
    }

    fn tag_propagation_policy(&self) -> TagPropagationPolicy {
        TagPropagationPolicy::OneToOne
    }
}

#[test]
fn one_to_one_policy_keeps_lanes_apart() {
    let mut graph = Graph::new(RuntimeContext::new("lanes"));
    let a = graph.add_block(Box::new(
        VectorSource::new(vec![1u32; 20]).with_tag(3, "lane", "a"),
    ));
    let b = graph.add_block(Box::new(
        VectorSource::new(vec![2u32; 20]).with_tag(7, "lane", "b"),
    ));
    let lanes = graph.add_block(Box::new(Lanes));
    let (sink_a, handle_a) = VectorSink::<u32>::new();
    let (sink_b, handle_b) = VectorSink::<u32>::new();
    let sink_a = graph.add_block(Box::new(sink_a));
    let sink_b = graph.add_block(Box::new(sink_b));
    graph.connect(a, 0, lanes, 0).unwrap();
    graph.connect(b, 0, lanes, 1).unwrap();
    graph.connect(lanes, 0, sink_a, 0).unwrap();
    graph.connect(lanes, 1, sink_b, 0).unwrap();
    let mut exec = GraphExecutor::new(graph).unwrap();

    exec.run_one_iteration();

    assert_eq!(handle_a.items(), vec![1; 20]);
    assert_eq!(handle_b.items(), vec![2; 20]);
    assert_eq!(tag_offsets(&handle_a.tags()), vec![3]);
    assert_eq!(tag_offsets(&handle_b.tags()), vec![7]);
}

// ============================================================================
// 5. Executor retry loop
// ============================================================================

/// Batch block that records every output grant and only accepts grants of
/// at most `accept` items.
struct Picky {
    grants: Arc<Mutex<Vec<usize>>>,
    accept: usize,
}

impl Block for Picky {
    fn alias(&self) -> &str {
        "picky"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(
            vec![PortSpec::of::<f32>("in")],
            vec![PortSpec::of::<f32>("out")],
        )
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let granted = io.output(0).n_items();
        self.grants.lock().unwrap().push(granted);
        if granted > self.accept {
            return WorkReturnCode::InsufficientInputItems;
        }
        let (input, output) = io.pair(0, 0);
        let n = granted.min(input.n_items());
        output.produce(n);
        input.consume(n);
        WorkReturnCode::Ok
    }

    fn output_multiple(&self) -> Option<usize> {
        Some(64)
    }
}

fn picky_pipeline(accept: usize) -> (GraphExecutor, Arc<Mutex<Vec<usize>>>, BlockId) {
    let grants = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new(RuntimeContext::new("picky"))
        .with_buffer_properties(BufferProperties::new().with_buffer_size(1024));
    let src = graph.add_block(Box::new(NullSource::<f32>::new()));
    let picky = graph.add_block(Box::new(Picky {
        grants: Arc::clone(&grants),
        accept,
    }));
    let sink = graph.add_block(Box::new(NullSink::<f32>::new()));
    graph.connect(src, 0, picky, 0).unwrap();
    graph.connect(picky, 0, sink, 0).unwrap();
    (GraphExecutor::new(graph).unwrap(), grants, picky)
}

#[test]
fn insufficient_input_shrinks_by_output_multiple_until_blocked() {
    let (mut exec, grants, picky) = picky_pipeline(0);
    let states = exec.run_one_iteration();

    assert_eq!(states[&picky], ExecutionState::BlockedIn);
    assert_eq!(
        *grants.lock().unwrap(),
        vec![512, 448, 384, 320, 256, 192, 128, 64]
    );
}

#[test]
fn insufficient_input_retry_stops_at_first_success() {
    let (mut exec, grants, picky) = picky_pipeline(200);
    let states = exec.run_one_iteration();

    assert_eq!(states[&picky], ExecutionState::Ready);
    assert_eq!(*grants.lock().unwrap(), vec![512, 448, 384, 320, 256, 192]);
    assert_eq!(exec.output_buffer(picky, 0).unwrap().total_written(), 192);
}

// ============================================================================
// 6. Runtime context isolation
// ============================================================================

#[test]
fn pipelines_keep_separate_bookkeeping() {
    let first = RuntimeContext::new("first");
    let second = RuntimeContext::new("second");
    let a = BufferProperties::new()
        .with_buffer_size(100)
        .create_buffer(4, &first)
        .unwrap();
    let _b = BufferProperties::new()
        .with_buffer_size(100)
        .create_buffer(8, &second)
        .unwrap();
    let _reader = reader(&a);

    assert_eq!(first.live_buffers(), 1);
    assert_eq!(first.allocated_bytes(), 400);
    assert_eq!(first.live_readers(), 1);
    assert_eq!(second.allocated_bytes(), 800);
    assert_eq!(second.live_readers(), 0);
    assert_eq!(a.id().index(), 0);
}
