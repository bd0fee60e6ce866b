//! Reference blocks.
//!
//! Small, general-purpose blocks used by tests, benches and the `sluice`
//! command line:
//!
//! - [`VectorSource`] - replays a vector once or forever, optionally tagged
//! - [`NullSource`] - endless zeros
//! - [`VectorSink`] - collects items and tags behind a [`SinkHandle`]
//! - [`NullSink`] - discards everything
//! - [`MultiplyConst`] - scales `f32` samples, optionally in fixed batches
//! - [`Head`] - passes the first N items and stops

pub mod head;
pub mod multiply_const;
pub mod null;
pub mod vector_sink;
pub mod vector_source;

pub use head::Head;
pub use multiply_const::MultiplyConst;
pub use null::{NullSink, NullSource};
pub use vector_sink::{SinkHandle, VectorSink};
pub use vector_source::VectorSource;
