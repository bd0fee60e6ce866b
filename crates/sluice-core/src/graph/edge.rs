//! Stream connections between block ports.
//!
//! An edge joins one output port to one input port. All edges leaving the same
//! output port share that port's buffer; each edge owns one reader into it.

use core::fmt;

use crate::block::BlockId;

/// Unique identifier for an edge in a graph.
///
/// Edge IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

/// A directed connection from an output port to an input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Writing block.
    pub src: BlockId,
    /// Output port index on `src`.
    pub src_port: usize,
    /// Reading block.
    pub dst: BlockId,
    /// Input port index on `dst`.
    pub dst_port: usize,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} → {}:{}",
            self.src.index(),
            self.src_port,
            self.dst.index(),
            self.dst_port
        )
    }
}
