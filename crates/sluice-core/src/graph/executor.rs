//! Single-iteration executor.
//!
//! [`GraphExecutor::run_one_iteration`] visits every block once, in insertion
//! order, and decides from the state of its buffers whether the block can work
//! right now. Nothing is carried across iterations except the buffers
//! themselves; a scheduler above this layer decides how often to call it and
//! when a pipeline has stalled for good.
//!
//! # Per-block sequence
//!
//! 1. `finished()` → [`ExecutionState::Done`].
//! 2. Hierarchical block, or no stream ports → [`ExecutionState::MsgOnly`].
//! 3. Every input must offer at least `max(min_items_to_process,
//!    min_buffer_read)` items, otherwise the reader's blocked callback runs and
//!    the block is [`ExecutionState::BlockedIn`]. Grants are clamped to
//!    `max_buffer_read`.
//! 4. Every output must offer at least `max(min_items_to_process,
//!    min_buffer_fill)` items, otherwise the buffer's blocked callback runs and
//!    the block is [`ExecutionState::BlockedOut`]. All outputs are granted the
//!    smallest figure, rounded down to the output multiple.
//! 5. `work()` runs. An insufficient-input answer shrinks the output grant and
//!    retries until it would drop below the output multiple (or one item).
//! 6. On `Ok`/`Done` the call is committed: tags propagate per policy, inputs
//!    are consumed, outputs are published, neighbors are notified and output
//!    tags are pruned.
//!
//! A block reporting more consumption or production than it was granted
//! panics: the counts can no longer be trusted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::block::{
    Block, BlockId, InputPort, OutputPort, TagPropagationPolicy, WorkIo, WorkReturnCode,
};
use crate::buffer::Buffer;
use crate::context::RuntimeContext;

use super::builder::{Graph, GraphError};
use super::notify::{Notification, Notify, NullNotifier};

/// Outcome of one block in one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// The block worked and may work again.
    Ready,
    /// The block is finished.
    Done,
    /// The block has no stream ports and was skipped.
    MsgOnly,
    /// Not enough input.
    BlockedIn,
    /// Not enough output space.
    BlockedOut,
}

impl ExecutionState {
    /// Returns true for `BlockedIn` and `BlockedOut`.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::BlockedIn | Self::BlockedOut)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "READY",
            Self::Done => "DONE",
            Self::MsgOnly => "MSG_ONLY",
            Self::BlockedIn => "BLKD_IN",
            Self::BlockedOut => "BLKD_OUT",
        })
    }
}

/// Running totals across all iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Completed `run_one_iteration`/`run_blocks` calls.
    pub iterations: u64,
    /// `work()` invocations, retries included.
    pub work_calls: u64,
    /// Items committed on all outputs.
    pub items_produced: u64,
    /// Items committed on all inputs.
    pub items_consumed: u64,
}

struct ExecNode {
    id: BlockId,
    block: Box<dyn Block>,
    io: WorkIo,
    /// Writer of each input port.
    upstream: Vec<BlockId>,
    /// Readers of each output port.
    downstream: Vec<Vec<BlockId>>,
}

/// Drives the blocks of a [`Graph`] one iteration at a time.
pub struct GraphExecutor {
    context: Arc<RuntimeContext>,
    nodes: Vec<ExecNode>,
    notifier: Box<dyn Notify>,
    min_items_to_process: usize,
    stats: ExecutorStats,
}

impl GraphExecutor {
    /// Takes ownership of `graph` and prepares every block's ports.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnconnectedPort`] if a stream port of a
    /// non-hierarchical block has no connection, and
    /// [`GraphError::OutputMultipleTooLarge`] if a block's output multiple
    /// exceeds the write limit of one of its output buffers.
    pub fn new(graph: Graph) -> Result<Self, GraphError> {
        let context = Arc::clone(graph.context());
        let edges: Vec<_> = graph.edges().map(|(_, edge)| edge).collect();
        let mut nodes = Vec::with_capacity(graph.nodes.len());

        for (index, node) in graph.nodes.into_iter().enumerate() {
            let id = BlockId(index as u32);
            let hier = node.block.is_hier();
            let multiple = node.block.output_multiple().filter(|&m| m > 0);

            let mut inputs = Vec::with_capacity(node.inputs.len());
            let mut upstream = Vec::with_capacity(node.inputs.len());
            let input_links = node.inputs.into_iter().zip(&node.ports.inputs);
            for (port, (link, spec)) in input_links.enumerate() {
                match link {
                    Some(link) => {
                        let src = edges
                            .iter()
                            .find(|e| e.dst == id && e.dst_port == port)
                            .map_or(id, |e| e.src);
                        upstream.push(src);
                        inputs.push(InputPort::new(spec.name.clone(), link.reader));
                    }
                    None if hier => {}
                    None => {
                        return Err(GraphError::UnconnectedPort {
                            block: id,
                            alias: node.block.alias().to_owned(),
                            direction: "input",
                            port,
                        });
                    }
                }
            }

            let mut outputs = Vec::with_capacity(node.outputs.len());
            let mut downstream = Vec::with_capacity(node.outputs.len());
            let output_buffers = node.outputs.into_iter().zip(&node.ports.outputs);
            for (port, (buffer, spec)) in output_buffers.enumerate() {
                match buffer {
                    Some(buffer) => {
                        if let Some(multiple) = multiple
                            && multiple > buffer.write_limit()
                        {
                            return Err(GraphError::OutputMultipleTooLarge {
                                block: id,
                                alias: node.block.alias().to_owned(),
                                port,
                                multiple,
                                limit: buffer.write_limit(),
                            });
                        }
                        downstream.push(
                            edges
                                .iter()
                                .filter(|e| e.src == id && e.src_port == port)
                                .map(|e| e.dst)
                                .collect(),
                        );
                        outputs.push(OutputPort::new(spec.name.clone(), buffer));
                    }
                    None if hier => {}
                    None => {
                        return Err(GraphError::UnconnectedPort {
                            block: id,
                            alias: node.block.alias().to_owned(),
                            direction: "output",
                            port,
                        });
                    }
                }
            }

            nodes.push(ExecNode {
                id,
                block: node.block,
                io: WorkIo::new(inputs, outputs),
                upstream,
                downstream,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "executor_new: {} blocks, {} edges ({})",
            nodes.len(),
            edges.len(),
            context.name()
        );

        Ok(Self {
            context,
            nodes,
            notifier: Box::new(NullNotifier),
            min_items_to_process: 1,
            stats: ExecutorStats::default(),
        })
    }

    /// Routes neighbor notifications to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: impl Notify + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Sets the smallest input/output grant worth calling `work()` for.
    /// Values below one are raised to one.
    #[must_use]
    pub fn with_min_items_to_process(mut self, items: usize) -> Self {
        self.min_items_to_process = items.max(1);
        self
    }

    /// Runtime context shared by the graph's buffers.
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    /// Smallest grant worth calling `work()` for.
    pub fn min_items_to_process(&self) -> usize {
        self.min_items_to_process
    }

    /// Running totals.
    pub fn stats(&self) -> ExecutorStats {
        self.stats
    }

    /// IDs of all blocks in execution order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    /// The block behind `id`.
    pub fn block(&self, id: BlockId) -> Option<&dyn Block> {
        self.nodes
            .get(id.0 as usize)
            .map(|node| node.block.as_ref())
    }

    /// Buffer behind output `port` of `id`.
    pub fn output_buffer(&self, id: BlockId, port: usize) -> Option<&Buffer> {
        self.nodes
            .get(id.0 as usize)?
            .io
            .outputs()
            .get(port)
            .map(OutputPort::buffer)
    }

    /// Runs every block once, in insertion order.
    pub fn run_one_iteration(&mut self) -> BTreeMap<BlockId, ExecutionState> {
        let ids = self.block_ids();
        self.run_blocks(&ids)
    }

    /// Runs the given blocks once, in the given order. Unknown IDs are
    /// skipped and absent from the result.
    pub fn run_blocks(&mut self, ids: &[BlockId]) -> BTreeMap<BlockId, ExecutionState> {
        let mut states = BTreeMap::new();
        for &id in ids {
            let Some(node) = self.nodes.get_mut(id.0 as usize) else {
                continue;
            };
            let state = run_block(
                node,
                self.min_items_to_process,
                self.notifier.as_ref(),
                &mut self.stats,
            );
            #[cfg(feature = "tracing")]
            tracing::trace!("block_state: {} {id} {state}", node.block.alias());
            states.insert(id, state);
        }
        self.stats.iterations += 1;
        states
    }
}

impl fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("context", &self.context.name())
            .field("blocks", &self.nodes.len())
            .field("min_items_to_process", &self.min_items_to_process)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn run_block(
    node: &mut ExecNode,
    min_items: usize,
    notifier: &dyn Notify,
    stats: &mut ExecutorStats,
) -> ExecutionState {
    if node.block.finished() {
        return ExecutionState::Done;
    }
    if node.block.is_hier() || node.io.is_empty() {
        return ExecutionState::MsgOnly;
    }

    node.io.reset();

    for port in node.io.inputs_mut() {
        let reader = port.reader();
        let info = reader.read_info();
        let floor = reader
            .properties()
            .min_buffer_read()
            .map_or(min_items, |m| m.max(min_items));
        if info.n_items < floor {
            reader.input_blocked_callback(floor);
            #[cfg(feature = "tracing")]
            tracing::trace!(
                "block_blocked_in: {} port {} has {} of {floor} items",
                node.id,
                port.name(),
                info.n_items
            );
            return ExecutionState::BlockedIn;
        }
        let n_items = reader
            .properties()
            .max_buffer_read()
            .map_or(info.n_items, |m| info.n_items.min(m));
        let (offset, tags) = reader.window_tags(n_items);
        port.grant(n_items, offset, tags);
    }

    let mut max_output = usize::MAX;
    let mut write_offsets = Vec::with_capacity(node.io.outputs().len());
    for port in node.io.outputs() {
        let buffer = port.buffer();
        let info = buffer.write_info();
        let floor = buffer
            .properties()
            .min_buffer_fill()
            .map_or(min_items, |m| m.max(min_items));
        if info.n_items < floor {
            buffer.output_blocked_callback(false);
            #[cfg(feature = "tracing")]
            tracing::trace!(
                "block_blocked_out: {} port {} has {} of {floor} items",
                node.id,
                port.name(),
                info.n_items
            );
            return ExecutionState::BlockedOut;
        }
        max_output = max_output.min(info.n_items);
        write_offsets.push(info.total_written);
    }

    let multiple = node.block.output_multiple().filter(|&m| m > 0);
    if !write_offsets.is_empty() {
        if let Some(m) = multiple {
            max_output = max_output / m * m;
        }
        if max_output == 0 {
            for port in node.io.outputs() {
                port.buffer().output_blocked_callback(false);
            }
            return ExecutionState::BlockedOut;
        }
        for (port, offset) in node.io.outputs_mut().iter_mut().zip(write_offsets) {
            port.grant(max_output, offset);
        }
    }

    let code = loop {
        stats.work_calls += 1;
        match node.block.work(&mut node.io) {
            code @ (WorkReturnCode::Ok | WorkReturnCode::Done) => break code,
            WorkReturnCode::InsufficientOutputItems => return ExecutionState::BlockedOut,
            WorkReturnCode::InsufficientInputItems => {
                if node.io.outputs().is_empty() {
                    return ExecutionState::BlockedIn;
                }
                let (next, floor) = match multiple {
                    Some(m) => (max_output.saturating_sub(m), m),
                    None => (max_output / 2, 1),
                };
                if next < floor {
                    return ExecutionState::BlockedIn;
                }
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    "block_retry: {} insufficient input, output {max_output} → {next}",
                    node.id
                );
                max_output = next;
                for port in node.io.outputs_mut() {
                    port.shrink(max_output);
                }
                node.io.clear_counters();
            }
        }
    };

    commit(node, notifier, stats);

    match code {
        WorkReturnCode::Done => ExecutionState::Done,
        _ if node.io.inputs().is_empty() && node.io.total_produced() == 0 => {
            ExecutionState::BlockedIn
        }
        _ => ExecutionState::Ready,
    }
}

fn commit(node: &mut ExecNode, notifier: &dyn Notify, stats: &mut ExecutorStats) {
    let alias = node.block.alias();
    for port in node.io.inputs() {
        assert!(
            port.n_consumed() <= port.n_items(),
            "block {alias} consumed {} items on input {} but was granted {}",
            port.n_consumed(),
            port.name(),
            port.n_items()
        );
    }
    for port in node.io.outputs() {
        assert!(
            port.n_produced() <= port.n_items(),
            "block {alias} produced {} items on output {} but was granted {}",
            port.n_produced(),
            port.name(),
            port.n_items()
        );
    }

    let policy = node.block.tag_propagation_policy();
    for (i, input) in node.io.inputs().iter().enumerate() {
        let consumed = input.n_consumed();
        if consumed == 0 {
            continue;
        }
        match policy {
            TagPropagationPolicy::AllToAll => {
                for output in node.io.outputs() {
                    output.buffer().propagate_tags(input.reader(), consumed);
                }
            }
            TagPropagationPolicy::OneToOne => {
                if let Some(output) = node.io.outputs().get(i) {
                    output.buffer().propagate_tags(input.reader(), consumed);
                }
            }
            TagPropagationPolicy::None => {}
        }
    }

    for (input, &src) in node.io.inputs().iter().zip(&node.upstream) {
        let consumed = input.n_consumed();
        if consumed == 0 {
            continue;
        }
        input.reader().post_read(consumed);
        stats.items_consumed += consumed as u64;
        notifier.notify(src, Notification::Output);
    }

    for (output, readers) in node.io.outputs_mut().iter_mut().zip(&node.downstream) {
        for tag in output.take_tags() {
            output.buffer().add_tag(tag);
        }
        let produced = output.n_produced();
        if produced > 0 {
            output.buffer().post_write(produced);
            stats.items_produced += produced as u64;
            for &dst in readers {
                notifier.notify(dst, Notification::Input);
            }
        }
        output.buffer().prune_tags();
    }
}
