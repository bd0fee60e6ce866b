//! The contract between the executor and a processing block.
//!
//! A block declares its stream ports once ([`Block::ports`]) and is then driven
//! through [`Block::work`]: each call sees a [`WorkIo`] whose input ports
//! report how many items may be consumed and whose output ports report how
//! many may be produced. The block records what it actually consumed and
//! produced on the ports and returns a [`WorkReturnCode`].
//!
//! The executor owns everything else: readiness checks, buffer commits, tag
//! propagation and neighbor notification.

pub mod work_io;

pub use work_io::{InputPort, OutputPort, WorkIo};

/// Unique identifier for a block in a graph.
///
/// Block IDs are assigned sequentially and never reused within a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for BlockId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// Result of one [`Block::work`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkReturnCode {
    /// Work was done; consumption and production are committed.
    Ok,
    /// The block is finished. Whatever it reported is still committed.
    Done,
    /// Not enough input for the requested output. The executor retries with a
    /// smaller output request.
    InsufficientInputItems,
    /// Not enough output space. Nothing is committed.
    InsufficientOutputItems,
}

/// Which output ports receive the tags of which input ports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagPropagationPolicy {
    /// Every output receives the tags of every consumed input.
    #[default]
    AllToAll,
    /// Output `i` receives only the tags of input `i`.
    OneToOne,
    /// Tags stop at this block.
    None,
}

/// Name and item size of one stream port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    /// Port name, for diagnostics.
    pub name: String,
    /// Bytes per item on this port.
    pub item_size: usize,
}

impl PortSpec {
    /// Creates a port specification.
    pub fn new(name: impl Into<String>, item_size: usize) -> Self {
        Self {
            name: name.into(),
            item_size,
        }
    }

    /// Port carrying items of type `T`.
    pub fn of<T: crate::buffer::Item>(name: impl Into<String>) -> Self {
        Self::new(name, T::SIZE)
    }
}

/// All stream ports of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortSignature {
    /// Input ports, in port-index order.
    pub inputs: Vec<PortSpec>,
    /// Output ports, in port-index order.
    pub outputs: Vec<PortSpec>,
}

impl PortSignature {
    /// Signature with the given ports.
    pub fn new(inputs: Vec<PortSpec>, outputs: Vec<PortSpec>) -> Self {
        Self { inputs, outputs }
    }

    /// A block with no stream ports (message-only).
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if the block has neither inputs nor outputs.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// A unit of stream computation driven by the executor.
pub trait Block: Send {
    /// Human-readable name, for logging.
    fn alias(&self) -> &str;

    /// Stream ports of this block. Queried once when the block is added.
    fn ports(&self) -> PortSignature;

    /// The block's work function.
    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode;

    /// Hierarchical blocks only group other blocks and never do work.
    fn is_hier(&self) -> bool {
        false
    }

    /// Returns true once the block has nothing left to do.
    fn finished(&self) -> bool {
        false
    }

    /// Batch size the block produces in multiples of, if any.
    fn output_multiple(&self) -> Option<usize> {
        None
    }

    /// How consumed input tags reach the outputs.
    fn tag_propagation_policy(&self) -> TagPropagationPolicy {
        TagPropagationPolicy::AllToAll
    }
}
