//! Block graphs and the one-iteration executor.
//!
//! The module uses a two-object split:
//!
//! - [`Graph`]: mutable topology. Blocks are added, ports connected and
//!   disconnected. Connecting an output port for the first time builds its
//!   buffer; every connection attaches a reader.
//! - [`GraphExecutor`]: takes the graph by value once it is complete and drives
//!   its blocks with [`run_one_iteration()`](GraphExecutor::run_one_iteration).
//!
//! # Example
//!
//! ```rust
//! use sluice_core::blocks::{VectorSink, VectorSource};
//! use sluice_core::graph::{ExecutionState, Graph, GraphExecutor};
//! use sluice_core::RuntimeContext;
//!
//! let mut graph = Graph::new(RuntimeContext::new("doc"));
//! let src = graph.add_block(Box::new(VectorSource::new(vec![1.0f32, 2.0, 3.0])));
//! let (sink, handle) = VectorSink::<f32>::new();
//! let sink = graph.add_block(Box::new(sink));
//! graph.connect(src, 0, sink, 0)?;
//!
//! let mut exec = GraphExecutor::new(graph)?;
//! let states = exec.run_one_iteration();
//! assert_eq!(states[&src], ExecutionState::Done);
//! assert_eq!(handle.items(), vec![1.0, 2.0, 3.0]);
//! # Ok::<(), sluice_core::graph::GraphError>(())
//! ```

mod builder;
pub mod edge;
pub mod executor;
pub mod notify;

pub use builder::{Graph, GraphError};
pub use edge::{Edge, EdgeId};
pub use executor::{ExecutionState, ExecutorStats, GraphExecutor};
pub use notify::{Notification, Notify, NullNotifier, RecordingNotifier};
