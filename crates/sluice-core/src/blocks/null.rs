//! Sources and sinks that carry no data of interest.

use core::marker::PhantomData;

use crate::block::{Block, PortSignature, PortSpec, WorkIo, WorkReturnCode};
use crate::buffer::Item;

/// Fills every granted output item with zero bytes. Never finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSource<T> {
    _item: PhantomData<T>,
}

impl<T: Item> NullSource<T> {
    /// Creates the source.
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T: Item> Block for NullSource<T> {
    fn alias(&self) -> &str {
        "null_source"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(vec![], vec![PortSpec::of::<T>("out")])
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let out = io.output(0);
        let n = out.remaining();
        let item_size = out.item_size();
        out.with_space(|space| space[..n * item_size].fill(0));
        out.produce(n);
        WorkReturnCode::Ok
    }
}

/// Consumes and discards every available item.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink<T> {
    _item: PhantomData<T>,
}

impl<T: Item> NullSink<T> {
    /// Creates the sink.
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T: Item> Block for NullSink<T> {
    fn alias(&self) -> &str {
        "null_sink"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(vec![PortSpec::of::<T>("in")], vec![])
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let input = io.input(0);
        let n = input.n_items();
        input.consume(n);
        WorkReturnCode::Ok
    }
}
