//! Graph construction: blocks, ports and the buffers between them.

use std::sync::Arc;

use thiserror::Error;

use crate::block::{Block, BlockId, PortSignature};
use crate::buffer::{Buffer, BufferError, BufferProperties, BufferReader};
use crate::context::RuntimeContext;

use super::edge::{Edge, EdgeId};

/// Errors that can occur while building a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The specified block was not found in the graph.
    #[error("block {0} not found")]
    UnknownBlock(BlockId),

    /// The specified edge was not found in the graph.
    #[error("edge {0} not found")]
    UnknownEdge(EdgeId),

    /// The block has no port with this index.
    #[error("block {block} has no {direction} port {port}")]
    UnknownPort {
        /// Block that was addressed.
        block: BlockId,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Requested port index.
        port: usize,
    },

    /// An input port can only have one upstream.
    #[error("input port {port} of block {block} is already connected")]
    InputAlreadyConnected {
        /// Reading block.
        block: BlockId,
        /// Input port index.
        port: usize,
    },

    /// The two ends of a connection carry different item sizes.
    #[error("cannot connect {src_size}-byte items to a {dst_size}-byte input")]
    ItemSizeMismatch {
        /// Item size of the output port.
        src_size: usize,
        /// Item size of the input port.
        dst_size: usize,
    },

    /// Every stream port must be connected before execution.
    #[error("{direction} port {port} of block {block} ({alias}) is not connected")]
    UnconnectedPort {
        /// Block with the dangling port.
        block: BlockId,
        /// Block alias, for diagnostics.
        alias: String,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Port index.
        port: usize,
    },

    /// A block's output multiple exceeds what its output buffer can grant
    /// per call, so the block could never produce.
    #[error("block {block} ({alias}) needs batches of {multiple} but output {port} allows {limit}")]
    OutputMultipleTooLarge {
        /// Offending block.
        block: BlockId,
        /// Block alias, for diagnostics.
        alias: String,
        /// Output port index.
        port: usize,
        /// The block's output multiple.
        multiple: usize,
        /// The buffer's write limit.
        limit: usize,
    },

    /// Buffer or reader construction failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub(crate) struct InputLink {
    pub edge: EdgeId,
    pub reader: BufferReader,
}

pub(crate) struct NodeData {
    pub block: Box<dyn Block>,
    pub ports: PortSignature,
    pub inputs: Vec<Option<InputLink>>,
    pub outputs: Vec<Option<Buffer>>,
}

/// A set of blocks joined by stream edges.
///
/// One buffer is created per connected output port, on its first connection,
/// and shared by every edge leaving that port. Each edge attaches its own
/// reader, so downstream blocks consume independently.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add blocks with [`add_block()`](Self::add_block)
/// 3. Connect ports with [`connect()`](Self::connect)
/// 4. Hand the graph to [`GraphExecutor::new()`](super::GraphExecutor::new)
pub struct Graph {
    context: Arc<RuntimeContext>,
    properties: BufferProperties,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) edges: Vec<Option<Edge>>,
}

impl Graph {
    /// Creates an empty graph whose buffers are accounted in `context`.
    pub fn new(context: Arc<RuntimeContext>) -> Self {
        Self {
            context,
            properties: BufferProperties::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Sets the buffer properties used by [`connect()`](Self::connect).
    #[must_use]
    pub fn with_buffer_properties(mut self, properties: BufferProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Runtime context shared by this graph's buffers.
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    /// Default buffer properties.
    pub fn buffer_properties(&self) -> &BufferProperties {
        &self.properties
    }

    /// Adds a block. Returns the new block's ID.
    pub fn add_block(&mut self, block: Box<dyn Block>) -> BlockId {
        let id = BlockId(self.nodes.len() as u32);
        let ports = block.ports();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_add: {} {id} ({} in, {} out)",
            block.alias(),
            ports.inputs.len(),
            ports.outputs.len()
        );
        self.nodes.push(NodeData {
            block,
            inputs: ports.inputs.iter().map(|_| None).collect(),
            outputs: ports.outputs.iter().map(|_| None).collect(),
            ports,
        });
        id
    }

    /// Connects output `src_port` of `src` to input `dst_port` of `dst` using
    /// the graph's default buffer properties.
    ///
    /// # Errors
    ///
    /// Fails if either block or port does not exist, the input is already
    /// connected, the item sizes differ, or the buffer cannot be built.
    pub fn connect(
        &mut self,
        src: BlockId,
        src_port: usize,
        dst: BlockId,
        dst_port: usize,
    ) -> Result<EdgeId, GraphError> {
        let properties = self.properties.clone();
        self.connect_with(src, src_port, dst, dst_port, &properties)
    }

    /// Like [`connect()`](Self::connect) with explicit buffer properties.
    ///
    /// The properties size the buffer only when this is the first edge from
    /// `src_port`; they always configure the new reader.
    ///
    /// Readers attached here start at the current write position with no
    /// history: nothing has been written while a graph is being built. A
    /// reader that must re-read earlier items is attached to a live buffer
    /// with [`Buffer::add_reader`] and a non-zero `history`.
    ///
    /// # Errors
    ///
    /// See [`connect()`](Self::connect).
    pub fn connect_with(
        &mut self,
        src: BlockId,
        src_port: usize,
        dst: BlockId,
        dst_port: usize,
        properties: &BufferProperties,
    ) -> Result<EdgeId, GraphError> {
        let src_size = self.port_item_size(src, "output", src_port)?;
        let dst_size = self.port_item_size(dst, "input", dst_port)?;
        if self.nodes[dst.0 as usize].inputs[dst_port].is_some() {
            return Err(GraphError::InputAlreadyConnected {
                block: dst,
                port: dst_port,
            });
        }
        if src_size != dst_size {
            return Err(GraphError::ItemSizeMismatch { src_size, dst_size });
        }

        let buffer = match &self.nodes[src.0 as usize].outputs[src_port] {
            Some(buffer) => buffer.clone(),
            None => {
                let buffer = properties.create_buffer(src_size, &self.context)?;
                self.nodes[src.0 as usize].outputs[src_port] = Some(buffer.clone());
                buffer
            }
        };
        let reader = buffer.add_reader(properties, dst_size, 0)?;

        let edge = EdgeId(self.edges.len() as u32);
        self.edges.push(Some(Edge {
            src,
            src_port,
            dst,
            dst_port,
        }));
        self.nodes[dst.0 as usize].inputs[dst_port] = Some(InputLink { edge, reader });

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {edge} {src}:{src_port} → {dst}:{dst_port}");
        Ok(edge)
    }

    /// Removes an edge and detaches its reader from the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge doesn't exist.
    pub fn disconnect(&mut self, id: EdgeId) -> Result<(), GraphError> {
        let edge = self
            .edges
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::UnknownEdge(id))?;
        self.nodes[edge.dst.0 as usize].inputs[edge.dst_port] = None;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {id}");
        Ok(())
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.nodes.len()
    }

    /// IDs of all blocks in insertion order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        (0..self.nodes.len() as u32).map(BlockId).collect()
    }

    /// The block behind `id`.
    pub fn block(&self, id: BlockId) -> Option<&dyn Block> {
        self.nodes.get(id.0 as usize).map(|node| node.block.as_ref())
    }

    /// Port signature recorded when the block was added.
    pub fn ports(&self, id: BlockId) -> Option<&PortSignature> {
        self.nodes.get(id.0 as usize).map(|node| &node.ports)
    }

    /// Live edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| edge.map(|edge| (EdgeId(i as u32), edge)))
    }

    /// Buffer behind output `port` of `id`, once connected.
    pub fn output_buffer(&self, id: BlockId, port: usize) -> Option<&Buffer> {
        self.nodes.get(id.0 as usize)?.outputs.get(port)?.as_ref()
    }

    /// Reader behind input `port` of `id`, once connected.
    pub fn input_reader(&self, id: BlockId, port: usize) -> Option<&BufferReader> {
        self.nodes
            .get(id.0 as usize)?
            .inputs
            .get(port)?
            .as_ref()
            .map(|link| &link.reader)
    }

    fn port_item_size(
        &self,
        id: BlockId,
        direction: &'static str,
        port: usize,
    ) -> Result<usize, GraphError> {
        let node = self
            .nodes
            .get(id.0 as usize)
            .ok_or(GraphError::UnknownBlock(id))?;
        let ports = if direction == "input" {
            &node.ports.inputs
        } else {
            &node.ports.outputs
        };
        ports
            .get(port)
            .map(|spec| spec.item_size)
            .ok_or(GraphError::UnknownPort {
                block: id,
                direction,
                port,
            })
    }
}

impl core::fmt::Debug for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Graph")
            .field("context", &self.context.name())
            .field("blocks", &self.nodes.len())
            .field("edges", &self.edges.iter().flatten().count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{NullSink, NullSource, VectorSink};

    fn graph() -> Graph {
        Graph::new(RuntimeContext::new("graph"))
            .with_buffer_properties(BufferProperties::new().with_buffer_size(256))
    }

    #[test]
    fn connect_shares_one_buffer_per_output() {
        let mut g = graph();
        let src = g.add_block(Box::new(NullSource::<f32>::new()));
        let a = g.add_block(Box::new(NullSink::<f32>::new()));
        let b = g.add_block(Box::new(NullSink::<f32>::new()));

        g.connect(src, 0, a, 0).unwrap();
        g.connect(src, 0, b, 0).unwrap();

        let buffer = g.output_buffer(src, 0).unwrap();
        assert_eq!(buffer.reader_count(), 2);
        assert_eq!(buffer.capacity(), 256);
        assert_eq!(g.context().live_buffers(), 1);
        assert_eq!(g.edges().count(), 2);
    }

    #[test]
    fn connect_rejects_bad_ports() {
        let mut g = graph();
        let src = g.add_block(Box::new(NullSource::<f32>::new()));
        let sink = g.add_block(Box::new(NullSink::<f32>::new()));
        let wide = g.add_block(Box::new(NullSink::<f64>::new()));

        assert!(matches!(
            g.connect(src, 1, sink, 0),
            Err(GraphError::UnknownPort {
                direction: "output",
                port: 1,
                ..
            })
        ));
        assert!(matches!(
            g.connect(src, 0, BlockId(9), 0),
            Err(GraphError::UnknownBlock(BlockId(9)))
        ));
        assert!(matches!(
            g.connect(src, 0, wide, 0),
            Err(GraphError::ItemSizeMismatch {
                src_size: 4,
                dst_size: 8
            })
        ));

        g.connect(src, 0, sink, 0).unwrap();
        assert!(matches!(
            g.connect(src, 0, sink, 0),
            Err(GraphError::InputAlreadyConnected { port: 0, .. })
        ));
    }

    #[test]
    fn disconnect_detaches_reader() {
        let mut g = graph();
        let src = g.add_block(Box::new(NullSource::<u32>::new()));
        let (sink, _handle) = VectorSink::<u32>::new();
        let sink = g.add_block(Box::new(sink));
        let edge = g.connect(src, 0, sink, 0).unwrap();

        g.disconnect(edge).unwrap();
        assert_eq!(g.output_buffer(src, 0).unwrap().reader_count(), 0);
        assert!(g.input_reader(sink, 0).is_none());
        assert!(matches!(
            g.disconnect(edge),
            Err(GraphError::UnknownEdge(_))
        ));
    }

    #[test]
    fn graph_readers_start_without_history() {
        let mut g = graph();
        let src = g.add_block(Box::new(NullSource::<u32>::new()));
        let sink = g.add_block(Box::new(NullSink::<u32>::new()));
        g.connect(src, 0, sink, 0).unwrap();

        let buffer = g.output_buffer(src, 0).unwrap();
        assert_eq!(
            buffer.add_reader(&BufferProperties::new(), 4, 1).unwrap_err(),
            BufferError::HistoryUnavailable {
                requested: 1,
                available: 0
            }
        );

        // Once items exist, a late reader can look back over them.
        buffer.with_write_region(|region| region[..16].fill(0));
        buffer.post_write(4);
        let late = buffer.add_reader(&BufferProperties::new(), 4, 4).unwrap();
        assert_eq!(late.read_info().n_items, 4);
        assert_eq!(g.input_reader(sink, 0).unwrap().read_info().n_items, 4);
    }

    #[test]
    fn invalid_buffer_properties_surface_at_connect() {
        let mut g = Graph::new(RuntimeContext::new("bad"))
            .with_buffer_properties(BufferProperties::new().with_buffer_size(0));
        let src = g.add_block(Box::new(NullSource::<u8>::new()));
        let sink = g.add_block(Box::new(NullSink::<u8>::new()));
        assert!(matches!(
            g.connect(src, 0, sink, 0),
            Err(GraphError::Buffer(BufferError::ZeroCapacity))
        ));
    }
}
