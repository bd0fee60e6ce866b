//! Passes a fixed number of items, then stops.

use core::marker::PhantomData;

use crate::block::{Block, PortSignature, PortSpec, WorkIo, WorkReturnCode};
use crate::buffer::Item;

/// Copies the first `n` items of its input to its output and then reports
/// done.
#[derive(Debug, Clone, Copy)]
pub struct Head<T> {
    remaining: u64,
    _item: PhantomData<T>,
}

impl<T: Item> Head<T> {
    /// Creates a block that lets `n` items through.
    pub fn new(n: u64) -> Self {
        Self {
            remaining: n,
            _item: PhantomData,
        }
    }

    /// Items still to pass.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<T: Item> Block for Head<T> {
    fn alias(&self) -> &str {
        "head"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(
            vec![PortSpec::of::<T>("in")],
            vec![PortSpec::of::<T>("out")],
        )
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let (input, output) = io.pair(0, 0);
        let n = input
            .n_items()
            .min(output.remaining())
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let len = n * T::SIZE;
        input.with_items(|src| {
            output.with_space(|dst| dst[..len].copy_from_slice(&src[..len]));
        });
        input.consume(n);
        output.produce(n);
        self.remaining -= n as u64;

        if self.remaining == 0 {
            WorkReturnCode::Done
        } else {
            WorkReturnCode::Ok
        }
    }

    fn finished(&self) -> bool {
        self.remaining == 0
    }
}
