//! Serializable buffer settings.

use serde::{Deserialize, Serialize};
use sluice_core::{BufferError, BufferProperties};

/// Buffer settings as they appear in a pipeline file.
///
/// Every field is optional; unset fields leave the corresponding
/// [`BufferProperties`] knob at its default.
///
/// ```toml
/// [buffer]
/// buffer_size = 8192
/// max_buffer_fill = 1024
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BufferConfig {
    /// Requested capacity in items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Lower clamp bound on the capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_buffer_size: Option<usize>,
    /// Upper clamp bound on the capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffer_size: Option<usize>,
    /// Minimum room a writer needs before it runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_buffer_fill: Option<usize>,
    /// Maximum items a writer may produce per call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffer_fill: Option<usize>,
    /// Minimum items a reader needs before it runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_buffer_read: Option<usize>,
    /// Maximum items a reader may consume per call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffer_read: Option<usize>,
}

impl BufferConfig {
    /// Settings with every knob unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested capacity.
    pub fn with_buffer_size(mut self, items: usize) -> Self {
        self.buffer_size = Some(items);
        self
    }

    /// Set the per-call production limit.
    pub fn with_max_buffer_fill(mut self, items: usize) -> Self {
        self.max_buffer_fill = Some(items);
        self
    }

    /// Set the per-call consumption limit.
    pub fn with_max_buffer_read(mut self, items: usize) -> Self {
        self.max_buffer_read = Some(items);
        self
    }

    /// Set the minimum batch a reader waits for.
    pub fn with_min_buffer_read(mut self, items: usize) -> Self {
        self.min_buffer_read = Some(items);
        self
    }

    /// Returns true if no knob is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers `other` on top of `self`: fields set in `other` win.
    pub fn merged(&self, other: &BufferConfig) -> BufferConfig {
        BufferConfig {
            buffer_size: other.buffer_size.or(self.buffer_size),
            min_buffer_size: other.min_buffer_size.or(self.min_buffer_size),
            max_buffer_size: other.max_buffer_size.or(self.max_buffer_size),
            min_buffer_fill: other.min_buffer_fill.or(self.min_buffer_fill),
            max_buffer_fill: other.max_buffer_fill.or(self.max_buffer_fill),
            min_buffer_read: other.min_buffer_read.or(self.min_buffer_read),
            max_buffer_read: other.max_buffer_read.or(self.max_buffer_read),
        }
    }

    /// Converts to runtime buffer properties (singly-mapped implementation).
    pub fn to_properties(&self) -> BufferProperties {
        let mut props = BufferProperties::new();
        if let Some(n) = self.buffer_size {
            props = props.with_buffer_size(n);
        }
        if let Some(n) = self.min_buffer_size {
            props = props.with_min_buffer_size(n);
        }
        if let Some(n) = self.max_buffer_size {
            props = props.with_max_buffer_size(n);
        }
        if let Some(n) = self.min_buffer_fill {
            props = props.with_min_buffer_fill(n);
        }
        if let Some(n) = self.max_buffer_fill {
            props = props.with_max_buffer_fill(n);
        }
        if let Some(n) = self.min_buffer_read {
            props = props.with_min_buffer_read(n);
        }
        if let Some(n) = self.max_buffer_read {
            props = props.with_max_buffer_read(n);
        }
        props
    }

    /// Capacity, in items, a buffer of `item_size`-byte items would get.
    ///
    /// # Errors
    ///
    /// Fails on inverted bounds or a zero capacity.
    pub fn resolve_capacity(&self, item_size: usize) -> Result<usize, BufferError> {
        self.to_properties().resolve_capacity(item_size)
    }
}

impl From<&BufferConfig> for BufferProperties {
    fn from(config: &BufferConfig) -> Self {
        config.to_properties()
    }
}
