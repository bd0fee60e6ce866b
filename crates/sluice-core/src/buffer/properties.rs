//! Buffer configuration knobs and the factory hooks that build buffers.
//!
//! [`BufferProperties`] is attached to every edge of a graph. It decides the
//! buffer capacity (requested size clamped to `[min, max]`), bounds how many
//! items a writer may produce or a reader may consume per work call, and
//! carries the factory functions that construct the concrete buffer and
//! reader implementation.
//!
//! | knob | effect |
//! |---|---|
//! | `buffer_size` | requested capacity in items |
//! | `min_buffer_size` / `max_buffer_size` | clamp bounds on the capacity |
//! | `min_buffer_fill` / `max_buffer_fill` | per-call lower/upper bound on items produced |
//! | `min_buffer_read` / `max_buffer_read` | per-call lower/upper bound on items consumed |
//! | `factory` / `reader_factory` | constructors selecting the implementation |

use std::fmt;
use std::sync::Arc;

use crate::context::RuntimeContext;

use super::reader::BufferReader;
use super::{Buffer, BufferError};

/// Default buffer allocation when no `buffer_size` is requested, in bytes.
pub const DEFAULT_BUFFER_BYTES: usize = 65536;

/// Builds a buffer of `num_items` items of `item_size` bytes.
pub type BufferFactory = fn(
    num_items: usize,
    item_size: usize,
    properties: &BufferProperties,
    context: &Arc<RuntimeContext>,
) -> Result<Buffer, BufferError>;

/// Attaches a new reader to `buffer`, starting `history` items behind the writer.
pub type ReaderFactory = fn(
    buffer: &Buffer,
    properties: &BufferProperties,
    item_size: usize,
    history: usize,
) -> Result<BufferReader, BufferError>;

/// Configuration for one buffer and the readers attached to it.
#[derive(Clone)]
pub struct BufferProperties {
    buffer_size: Option<usize>,
    min_buffer_size: Option<usize>,
    max_buffer_size: Option<usize>,
    min_buffer_fill: Option<usize>,
    max_buffer_fill: Option<usize>,
    min_buffer_read: Option<usize>,
    max_buffer_read: Option<usize>,
    factory: BufferFactory,
    reader_factory: ReaderFactory,
}

impl Default for BufferProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferProperties")
            .field("buffer_size", &self.buffer_size)
            .field("min_buffer_size", &self.min_buffer_size)
            .field("max_buffer_size", &self.max_buffer_size)
            .field("min_buffer_fill", &self.min_buffer_fill)
            .field("max_buffer_fill", &self.max_buffer_fill)
            .field("min_buffer_read", &self.min_buffer_read)
            .field("max_buffer_read", &self.max_buffer_read)
            .finish_non_exhaustive()
    }
}

impl BufferProperties {
    /// Properties selecting the singly-mapped buffer with no limits set.
    pub fn new() -> Self {
        Self {
            buffer_size: None,
            min_buffer_size: None,
            max_buffer_size: None,
            min_buffer_fill: None,
            max_buffer_fill: None,
            min_buffer_read: None,
            max_buffer_read: None,
            factory: super::singly_mapped::create_buffer,
            reader_factory: super::singly_mapped::create_reader,
        }
    }

    /// Sets the requested capacity in items.
    pub fn with_buffer_size(mut self, items: usize) -> Self {
        self.buffer_size = Some(items);
        self
    }

    /// Sets the lower clamp bound on the capacity.
    pub fn with_min_buffer_size(mut self, items: usize) -> Self {
        self.min_buffer_size = Some(items);
        self
    }

    /// Sets the upper clamp bound on the capacity.
    pub fn with_max_buffer_size(mut self, items: usize) -> Self {
        self.max_buffer_size = Some(items);
        self
    }

    /// Sets the minimum number of items a writer needs room for before it runs.
    pub fn with_min_buffer_fill(mut self, items: usize) -> Self {
        self.min_buffer_fill = Some(items);
        self
    }

    /// Sets the maximum number of items a writer may produce per call.
    pub fn with_max_buffer_fill(mut self, items: usize) -> Self {
        self.max_buffer_fill = Some(items);
        self
    }

    /// Sets the minimum number of items a reader needs before it runs.
    pub fn with_min_buffer_read(mut self, items: usize) -> Self {
        self.min_buffer_read = Some(items);
        self
    }

    /// Sets the maximum number of items a reader may consume per call.
    pub fn with_max_buffer_read(mut self, items: usize) -> Self {
        self.max_buffer_read = Some(items);
        self
    }

    /// Replaces the buffer and reader constructors.
    pub fn with_factory(mut self, factory: BufferFactory, reader_factory: ReaderFactory) -> Self {
        self.factory = factory;
        self.reader_factory = reader_factory;
        self
    }

    /// Requested capacity in items.
    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }

    /// Lower clamp bound on the capacity.
    pub fn min_buffer_size(&self) -> Option<usize> {
        self.min_buffer_size
    }

    /// Upper clamp bound on the capacity.
    pub fn max_buffer_size(&self) -> Option<usize> {
        self.max_buffer_size
    }

    /// Per-call lower bound on items produced.
    pub fn min_buffer_fill(&self) -> Option<usize> {
        self.min_buffer_fill
    }

    /// Per-call upper bound on items produced.
    pub fn max_buffer_fill(&self) -> Option<usize> {
        self.max_buffer_fill
    }

    /// Per-call lower bound on items consumed.
    pub fn min_buffer_read(&self) -> Option<usize> {
        self.min_buffer_read
    }

    /// Per-call upper bound on items consumed.
    pub fn max_buffer_read(&self) -> Option<usize> {
        self.max_buffer_read
    }

    /// Largest write grant for a buffer of `capacity` items: `max_buffer_fill`
    /// when set, otherwise half the capacity. Never zero, never above `capacity`.
    pub fn write_limit(&self, capacity: usize) -> usize {
        self.max_buffer_fill
            .unwrap_or(capacity / 2)
            .min(capacity)
            .max(1)
    }

    /// Checks that a reader configured with these properties can ever be
    /// granted `min_buffer_read` items from a buffer of `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::UnsatisfiableFloor`] otherwise.
    pub fn check_read_floor(&self, capacity: usize) -> Result<(), BufferError> {
        match self.min_buffer_read {
            Some(min) if min > capacity => Err(BufferError::UnsatisfiableFloor {
                name: "buffer_read",
                min,
                limit: capacity,
            }),
            _ => Ok(()),
        }
    }

    /// Computes the capacity, in items, for buffers of `item_size`-byte items.
    ///
    /// Uses `buffer_size` when set, otherwise [`DEFAULT_BUFFER_BYTES`] worth of
    /// items, then clamps to `[min_buffer_size, max_buffer_size]`.
    ///
    /// # Errors
    ///
    /// Fails if `item_size` is zero, the clamp bounds are inverted, the
    /// resulting capacity is zero, or a fill or read floor exceeds what the
    /// buffer could ever grant.
    pub fn resolve_capacity(&self, item_size: usize) -> Result<usize, BufferError> {
        if item_size == 0 {
            return Err(BufferError::ZeroItemSize);
        }
        if let (Some(min), Some(max)) = (self.min_buffer_size, self.max_buffer_size)
            && min > max
        {
            return Err(BufferError::InvalidBounds {
                name: "buffer_size",
                min,
                max,
            });
        }
        for (name, min, max) in [
            ("buffer_fill", self.min_buffer_fill, self.max_buffer_fill),
            ("buffer_read", self.min_buffer_read, self.max_buffer_read),
        ] {
            if let (Some(min), Some(max)) = (min, max)
                && min > max
            {
                return Err(BufferError::InvalidBounds { name, min, max });
            }
        }

        let mut items = self
            .buffer_size
            .unwrap_or(DEFAULT_BUFFER_BYTES / item_size);
        if let Some(min) = self.min_buffer_size {
            items = items.max(min);
        }
        if let Some(max) = self.max_buffer_size {
            items = items.min(max);
        }
        if items == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if let Some(min) = self.min_buffer_fill {
            let limit = self.write_limit(items);
            if min > limit {
                return Err(BufferError::UnsatisfiableFloor {
                    name: "buffer_fill",
                    min,
                    limit,
                });
            }
        }
        self.check_read_floor(items)?;
        Ok(items)
    }

    /// Builds a buffer for `item_size`-byte items through the configured factory.
    ///
    /// # Errors
    ///
    /// Propagates [`resolve_capacity`](Self::resolve_capacity) and factory errors.
    pub fn create_buffer(
        &self,
        item_size: usize,
        context: &Arc<RuntimeContext>,
    ) -> Result<Buffer, BufferError> {
        let items = self.resolve_capacity(item_size)?;
        (self.factory)(items, item_size, self, context)
    }

    /// Attaches a reader to `buffer` through the configured reader factory.
    ///
    /// # Errors
    ///
    /// Propagates reader factory errors (item size mismatch, excessive history).
    pub fn create_reader(
        &self,
        buffer: &Buffer,
        item_size: usize,
        history: usize,
    ) -> Result<BufferReader, BufferError> {
        (self.reader_factory)(buffer, self, item_size, history)
    }
}
