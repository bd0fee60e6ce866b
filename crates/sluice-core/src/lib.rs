//! Sluice Core - buffers and the block executor for streaming dataflow
//!
//! This crate provides the runtime core of a block-based streaming pipeline:
//! fixed-size items flow from a writing block through circular buffers to any
//! number of reading blocks, with offset-addressed tags riding alongside.
//!
//! # Core Abstractions
//!
//! ## Buffers
//!
//! - [`Buffer`] - single-writer, multi-reader circular item store
//! - [`BufferReader`] - independent read cursor with its own position
//! - [`BufferProperties`] - capacity and per-call fill/read bounds, plus the
//!   factory that picks the implementation
//! - [`RuntimeContext`] - per-pipeline bookkeeping shared by all buffers
//!
//! ## Tags
//!
//! - [`Tag`] - key/value metadata at an absolute item offset
//! - [`TagValue`] - the value side of a tag
//!
//! ## Blocks and Execution
//!
//! - [`Block`] - the work contract a processing block implements
//! - [`WorkIo`] - per-call view of a block's input and output ports
//! - [`Graph`] - blocks joined by edges, one buffer per output port
//! - [`GraphExecutor`] - runs every block once per
//!   [`run_one_iteration`](GraphExecutor::run_one_iteration)
//!
//! # Example
//!
//! ```rust
//! use sluice_core::blocks::{MultiplyConst, VectorSink, VectorSource};
//! use sluice_core::{Graph, GraphExecutor, RuntimeContext};
//!
//! let mut graph = Graph::new(RuntimeContext::new("example"));
//! let src = graph.add_block(Box::new(VectorSource::new(vec![1.0f32; 256])));
//! let gain = graph.add_block(Box::new(MultiplyConst::new(0.5)));
//! let (sink, handle) = VectorSink::<f32>::new();
//! let sink = graph.add_block(Box::new(sink));
//! graph.connect(src, 0, gain, 0)?;
//! graph.connect(gain, 0, sink, 0)?;
//!
//! let mut exec = GraphExecutor::new(graph)?;
//! while handle.len() < 256 {
//!     exec.run_one_iteration();
//! }
//! assert!(handle.items().iter().all(|&x| x == 0.5));
//! # Ok::<(), sluice_core::GraphError>(())
//! ```
//!
//! # Feature Flags
//!
//! - `tracing` - emit `tracing` events for buffer lifecycle, realignment and
//!   block state changes

pub mod block;
pub mod blocks;
pub mod buffer;
pub mod context;
pub mod graph;
pub mod tag;

// Re-export main types at crate root
pub use block::{
    Block, BlockId, InputPort, OutputPort, PortSignature, PortSpec, TagPropagationPolicy, WorkIo,
    WorkReturnCode,
};
pub use buffer::{
    Buffer, BufferError, BufferFactory, BufferKind, BufferProperties, BufferReader, Item,
    ReadInfo, ReaderFactory, ReaderId, ReaderStats, WriteInfo,
};
pub use context::{BufferId, RuntimeContext};
pub use graph::{
    Edge, EdgeId, ExecutionState, ExecutorStats, Graph, GraphError, GraphExecutor, Notification,
    Notify, NullNotifier, RecordingNotifier,
};
pub use tag::{Tag, TagStore, TagValue};
