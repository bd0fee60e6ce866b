//! Sink that collects items and tags into shared memory.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::block::{
    Block, PortSignature, PortSpec, TagPropagationPolicy, WorkIo, WorkReturnCode,
};
use crate::buffer::Item;
use crate::tag::Tag;

#[derive(Debug)]
struct Collected<T> {
    items: Vec<T>,
    tags: Vec<Tag>,
}

/// Read access to what a [`VectorSink`] collected.
///
/// The sink itself is moved into the graph; keep the handle to inspect the
/// result while or after the graph runs.
#[derive(Debug)]
pub struct SinkHandle<T> {
    inner: Arc<Mutex<Collected<T>>>,
}

impl<T> Clone for SinkHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Item> SinkHandle<T> {
    fn lock(&self) -> MutexGuard<'_, Collected<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every item received so far.
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    /// Every tag received so far, with offsets counted from the first item
    /// the sink consumed.
    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    /// Number of items received.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true if nothing was received yet.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

/// Consumes every available item and stores it, along with its tags.
#[derive(Debug)]
pub struct VectorSink<T> {
    inner: Arc<Mutex<Collected<T>>>,
}

impl<T: Item> VectorSink<T> {
    /// Creates a sink and the handle used to read what it collects.
    pub fn new() -> (Self, SinkHandle<T>) {
        let inner = Arc::new(Mutex::new(Collected {
            items: Vec::new(),
            tags: Vec::new(),
        }));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SinkHandle { inner },
        )
    }
}

impl<T: Item> Block for VectorSink<T> {
    fn alias(&self) -> &str {
        "vector_sink"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(vec![PortSpec::of::<T>("in")], vec![])
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let input = io.input(0);
        let items = input.items::<T>();
        let n = items.len();
        {
            let mut collected = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            collected.items.extend_from_slice(&items);
            collected.tags.extend_from_slice(input.tags());
        }
        input.consume(n);
        WorkReturnCode::Ok
    }

    fn tag_propagation_policy(&self) -> TagPropagationPolicy {
        TagPropagationPolicy::None
    }
}
