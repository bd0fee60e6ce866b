//! Per-call views of a block's stream ports.
//!
//! The executor fills each port with a grant (`n_items`) before calling
//! [`Block::work`](super::Block::work). The block reads from input ports,
//! writes into output ports and reports `n_consumed` / `n_produced` through
//! [`InputPort::consume`] and [`OutputPort::produce`] (or the typed helpers
//! that call them). Grants and counters are reset every iteration; the
//! underlying reader and buffer persist.

use crate::buffer::{Buffer, BufferReader, Item, encode_items};
use crate::tag::{Tag, TagValue};

/// Input side of a block: wraps a [`BufferReader`].
#[derive(Debug)]
pub struct InputPort {
    name: String,
    reader: BufferReader,
    n_items: usize,
    n_consumed: usize,
    offset: u64,
    tags: Vec<Tag>,
}

impl InputPort {
    pub(crate) fn new(name: impl Into<String>, reader: BufferReader) -> Self {
        Self {
            name: name.into(),
            reader,
            n_items: 0,
            n_consumed: 0,
            offset: 0,
            tags: Vec::new(),
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying reader.
    pub fn reader(&self) -> &BufferReader {
        &self.reader
    }

    /// Bytes per item.
    pub fn item_size(&self) -> usize {
        self.reader.item_size()
    }

    /// Items granted for this call.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Items the block reported as consumed.
    pub fn n_consumed(&self) -> usize {
        self.n_consumed
    }

    /// Absolute offset of the first granted item.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Tags attached to the granted items.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Runs `f` over the granted items as raw bytes.
    pub fn with_items<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let len = self.n_items * self.item_size();
        self.reader.with_read_region(|region| f(&region[..len.min(region.len())]))
    }

    /// Decodes the granted items.
    pub fn items<T: Item>(&self) -> Vec<T> {
        self.reader.read_items(self.n_items)
    }

    /// Reports `n` more items as consumed.
    pub fn consume(&mut self, n: usize) {
        self.n_consumed += n;
    }

    pub(crate) fn grant(&mut self, n_items: usize, offset: u64, tags: Vec<Tag>) {
        self.n_items = n_items;
        self.offset = offset;
        self.tags = tags;
    }

    fn reset(&mut self) {
        self.n_items = 0;
        self.n_consumed = 0;
        self.tags.clear();
    }
}

/// Output side of a block: wraps the writer end of a [`Buffer`].
#[derive(Debug)]
pub struct OutputPort {
    name: String,
    buffer: Buffer,
    n_items: usize,
    n_produced: usize,
    offset: u64,
    pending_tags: Vec<Tag>,
}

impl OutputPort {
    pub(crate) fn new(name: impl Into<String>, buffer: Buffer) -> Self {
        Self {
            name: name.into(),
            buffer,
            n_items: 0,
            n_produced: 0,
            offset: 0,
            pending_tags: Vec::new(),
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Bytes per item.
    pub fn item_size(&self) -> usize {
        self.buffer.item_size()
    }

    /// Items the block may produce in this call.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Items the block reported as produced.
    pub fn n_produced(&self) -> usize {
        self.n_produced
    }

    /// Granted items not produced yet.
    pub fn remaining(&self) -> usize {
        self.n_items.saturating_sub(self.n_produced)
    }

    /// Absolute offset of the first item produced in this call.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Runs `f` over the not-yet-produced part of the grant as raw bytes.
    /// Call [`produce`](Self::produce) afterwards for what was written.
    pub fn with_space<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let item_size = self.item_size();
        let start = self.n_produced * item_size;
        let end = self.n_items * item_size;
        self.buffer.with_write_region(|region| {
            let end = end.min(region.len());
            f(&mut region[start.min(end)..end])
        })
    }

    /// Encodes as many of `items` as fit in the remaining grant and reports
    /// them as produced. Returns how many were written.
    pub fn write<T: Item>(&mut self, items: &[T]) -> usize {
        let written = self.with_space(|space| encode_items(items, space));
        self.produce(written);
        written
    }

    /// Reports `n` more items as produced.
    pub fn produce(&mut self, n: usize) {
        self.n_produced += n;
    }

    /// Attaches a tag to the item at `index` within this call (0 is the first
    /// item produced in this call). The tag reaches the buffer when the
    /// executor commits the call.
    pub fn add_tag(&mut self, index: usize, key: impl Into<String>, value: impl Into<TagValue>) {
        self.pending_tags
            .push(Tag::new(self.offset + index as u64, key, value));
    }

    /// Tags added in this call and not committed yet.
    pub fn pending_tags(&self) -> &[Tag] {
        &self.pending_tags
    }

    pub(crate) fn take_tags(&mut self) -> Vec<Tag> {
        core::mem::take(&mut self.pending_tags)
    }

    pub(crate) fn grant(&mut self, n_items: usize, offset: u64) {
        self.n_items = n_items;
        self.offset = offset;
    }

    pub(crate) fn shrink(&mut self, n_items: usize) {
        self.n_items = n_items;
    }

    fn reset(&mut self) {
        self.n_items = 0;
        self.n_produced = 0;
        self.pending_tags.clear();
    }
}

/// All stream ports of a block for one work call.
#[derive(Debug, Default)]
pub struct WorkIo {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl WorkIo {
    /// Bundles ports in port-index order.
    pub fn new(inputs: Vec<InputPort>, outputs: Vec<OutputPort>) -> Self {
        Self { inputs, outputs }
    }

    /// Input ports.
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Output ports.
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Mutable input ports.
    pub fn inputs_mut(&mut self) -> &mut [InputPort] {
        &mut self.inputs
    }

    /// Mutable output ports.
    pub fn outputs_mut(&mut self) -> &mut [OutputPort] {
        &mut self.outputs
    }

    /// Input port `i`.
    ///
    /// # Panics
    ///
    /// Panics if the block has no input `i`.
    pub fn input(&mut self, i: usize) -> &mut InputPort {
        &mut self.inputs[i]
    }

    /// Output port `i`.
    ///
    /// # Panics
    ///
    /// Panics if the block has no output `i`.
    pub fn output(&mut self, i: usize) -> &mut OutputPort {
        &mut self.outputs[i]
    }

    /// Input port `i` together with output port `o`.
    pub fn pair(&mut self, i: usize, o: usize) -> (&mut InputPort, &mut OutputPort) {
        (&mut self.inputs[i], &mut self.outputs[o])
    }

    /// Returns true if the block has no stream ports.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Smallest input grant, or `None` without inputs.
    pub fn min_input_items(&self) -> Option<usize> {
        self.inputs.iter().map(InputPort::n_items).min()
    }

    /// Smallest remaining output grant, or `None` without outputs.
    pub fn min_output_items(&self) -> Option<usize> {
        self.outputs.iter().map(OutputPort::remaining).min()
    }

    /// Total items produced across all outputs.
    pub fn total_produced(&self) -> usize {
        self.outputs.iter().map(OutputPort::n_produced).sum()
    }

    /// Clears grants, counters and collected tags.
    pub fn reset(&mut self) {
        self.inputs.iter_mut().for_each(InputPort::reset);
        self.outputs.iter_mut().for_each(OutputPort::reset);
    }

    /// Clears consumed/produced counters and pending tags but keeps grants,
    /// for a retry.
    pub(crate) fn clear_counters(&mut self) {
        for input in &mut self.inputs {
            input.n_consumed = 0;
        }
        for output in &mut self.outputs {
            output.n_produced = 0;
            output.pending_tags.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferProperties;
    use crate::context::RuntimeContext;

    fn ports() -> (InputPort, OutputPort, Buffer) {
        let ctx = RuntimeContext::new("io");
        let upstream = BufferProperties::new()
            .with_buffer_size(64)
            .create_buffer(4, &ctx)
            .unwrap();
        let downstream = BufferProperties::new()
            .with_buffer_size(64)
            .create_buffer(4, &ctx)
            .unwrap();
        let reader = upstream.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        (
            InputPort::new("in", reader),
            OutputPort::new("out", downstream),
            upstream,
        )
    }

    #[test]
    fn input_items_are_limited_to_grant() {
        let (mut input, _output, upstream) = ports();
        upstream.push_items(&[1.0f32, 2.0, 3.0, 4.0]);
        input.grant(3, 0, Vec::new());
        assert_eq!(input.items::<f32>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(input.with_items(<[u8]>::len), 12);
    }

    #[test]
    fn output_write_respects_remaining_grant() {
        let (_input, mut output, _upstream) = ports();
        output.grant(4, 0);
        assert_eq!(output.write(&[1u32, 2, 3]), 3);
        assert_eq!(output.write(&[4u32, 5, 6]), 1);
        assert_eq!(output.n_produced(), 4);
        assert_eq!(output.remaining(), 0);

        let buf = output.buffer().clone();
        let reader = buf.add_reader(&BufferProperties::new(), 4, 0).unwrap();
        buf.post_write(output.n_produced());
        // Reader attached before the commit sees the produced items.
        assert_eq!(reader.read_items::<u32>(4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn output_tags_are_offset_by_grant_base() {
        let (_input, mut output, _upstream) = ports();
        output.grant(8, 100);
        output.add_tag(3, "sob", true);
        assert_eq!(output.pending_tags()[0].offset(), 103);
        assert_eq!(output.buffer().tag_count(), 0);
        assert_eq!(output.take_tags().len(), 1);
        assert!(output.pending_tags().is_empty());
    }

    #[test]
    fn reset_clears_grants_and_counters() {
        let (input, output, _upstream) = ports();
        let mut io = WorkIo::new(vec![input], vec![output]);
        io.input(0).grant(5, 0, vec![Tag::new(0, "k", TagValue::Null)]);
        io.input(0).consume(2);
        io.output(0).grant(5, 0);
        io.output(0).produce(1);
        assert_eq!(io.min_input_items(), Some(5));
        assert_eq!(io.min_output_items(), Some(4));

        io.clear_counters();
        assert_eq!(io.inputs()[0].n_consumed(), 0);
        assert_eq!(io.inputs()[0].n_items(), 5);

        io.reset();
        assert_eq!(io.inputs()[0].n_items(), 0);
        assert!(io.inputs()[0].tags().is_empty());
        assert_eq!(io.total_produced(), 0);
    }
}
