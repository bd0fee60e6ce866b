//! Scales a stream of `f32` samples by a constant.

use crate::block::{Block, PortSignature, PortSpec, WorkIo, WorkReturnCode};

/// Multiplies every sample by a constant factor.
///
/// With an output multiple set, the block only moves whole batches and asks
/// for a smaller grant when the input holds less than one.
///
/// # Example
///
/// ```rust
/// use sluice_core::blocks::MultiplyConst;
/// use sluice_core::Block;
///
/// let gain = MultiplyConst::new(0.5).with_output_multiple(64);
/// assert_eq!(gain.factor(), 0.5);
/// assert_eq!(gain.output_multiple(), Some(64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplyConst {
    factor: f32,
    output_multiple: Option<usize>,
}

impl MultiplyConst {
    /// Creates the block.
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            output_multiple: None,
        }
    }

    /// Produce only in multiples of `multiple` items. Zero clears it.
    #[must_use]
    pub fn with_output_multiple(mut self, multiple: usize) -> Self {
        self.output_multiple = (multiple > 0).then_some(multiple);
        self
    }

    /// Scale factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Change the scale factor.
    pub fn set_factor(&mut self, factor: f32) {
        self.factor = factor;
    }
}

impl Block for MultiplyConst {
    fn alias(&self) -> &str {
        "multiply_const"
    }

    fn ports(&self) -> PortSignature {
        PortSignature::new(
            vec![PortSpec::of::<f32>("in")],
            vec![PortSpec::of::<f32>("out")],
        )
    }

    fn work(&mut self, io: &mut WorkIo) -> WorkReturnCode {
        let (input, output) = io.pair(0, 0);
        let mut n = input.n_items().min(output.remaining());
        if let Some(multiple) = self.output_multiple {
            n = n / multiple * multiple;
            if n == 0 {
                return WorkReturnCode::InsufficientInputItems;
            }
        }

        let mut samples = input.items::<f32>();
        samples.truncate(n);
        for sample in &mut samples {
            *sample *= self.factor;
        }
        output.write(&samples);
        input.consume(n);
        WorkReturnCode::Ok
    }

    fn output_multiple(&self) -> Option<usize> {
        self.output_multiple
    }
}
