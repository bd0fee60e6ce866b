//! Source that replays an in-memory vector.

use crate::block::{Block, PortSignature, PortSpec, WorkIo, WorkReturnCode};
use crate::buffer::Item;
use crate::tag::TagValue;

/// Emits the items of a vector, once or forever.
///
/// Tags registered with [`with_tag`](Self::with_tag) are attached to the
/// matching vector index on every pass.
///
/// # Example
///
/// ```rust
/// use sluice_core::blocks::VectorSource;
/// use sluice_core::Block;
///
/// let src = VectorSource::new(vec![0u8, 1, 2]).with_tag(0, "sob", true);
/// assert!(!src.finished());
/// ```
#[derive(Debug, Clone)]
pub struct VectorSource<T> {
    items: Vec<T>,
    position: usize,
    repeat: bool,
    tags: Vec<(usize, String, TagValue)>,
}

impl<T: Item> VectorSource<T> {
    /// Creates a source that emits `items` once and then reports done.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            position: 0,
            repeat: false,
            tags: Vec::new(),
        }
    }

    /// Restart from the first item after the last one instead of finishing.
    #[must_use]
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Tags vector index `index` with `key = value`.
    #[must_use]
    pub fn with_tag(
        mut self,
        index: usize,
        key: impl Into<String>,
        value: impl Into<TagValue>,
    ) -> Self {
        self.tags.push((index, key.into(), value.into()));
        self
    }

    /// Number of items per pass.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Item> Block for VectorSource<T> {
    fn alias(&self) -> &str {
        "vector_source"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(vec![], vec![PortSpec::of::<T>("out")])
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        if self.items.is_empty() {
            return WorkReturnCode::Done;
        }
        let out = io.output(0);
        while out.remaining() > 0 {
            if self.position == self.items.len() {
                if !self.repeat {
                    break;
                }
                self.position = 0;
            }
            let start = self.position;
            let base = out.n_produced();
            let written = out.write(&self.items[start..]);
            if written == 0 {
                break;
            }
            self.position += written;
            for (index, key, value) in &self.tags {
                if (start..self.position).contains(index) {
                    out.add_tag(base + index - start, key.clone(), value.clone());
                }
            }
        }

        if self.finished() {
            WorkReturnCode::Done
        } else {
            WorkReturnCode::Ok
        }
    }

    fn finished(&self) -> bool {
        !self.repeat && self.position == self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vector_is_finished() {
        let src = VectorSource::<f32>::new(Vec::new());
        assert!(src.finished());
        assert!(src.is_empty());
    }

    #[test]
    fn repeating_source_never_finishes() {
        let src = VectorSource::new(vec![1u16, 2]).with_repeat(true);
        assert!(!src.finished());
        assert_eq!(src.len(), 2);
    }
}
