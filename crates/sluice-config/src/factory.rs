//! Turns a [`PipelineConfig`] into a runnable executor.
//!
//! Each configured block is instantiated from the catalog, block `i`'s output
//! is connected to block `i + 1`'s input, and the graph is handed to a
//! [`GraphExecutor`]. A block's `buffer` override is layered over the
//! pipeline's `[buffer]` table and sizes that block's output buffer.
//!
//! All configured blocks carry `f32` items.

use sluice_core::blocks::{
    Head, MultiplyConst, NullSink, NullSource, SinkHandle, VectorSink, VectorSource,
};
use sluice_core::{Block, BlockId, Graph, GraphExecutor, RuntimeContext};

use crate::block_config::{BlockConfig, parse_count, parse_factor, parse_flag};
use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use crate::validation::{ValidationError, validate_block, validate_pipeline};

/// A validated pipeline wired into an executor.
pub struct BuiltPipeline {
    /// Executor owning every block and buffer.
    pub executor: GraphExecutor,
    /// Block ids with their type names, in chain order.
    pub blocks: Vec<(BlockId, String)>,
    /// Handles onto every `vector_sink` in the chain.
    pub sinks: Vec<(BlockId, SinkHandle<f32>)>,
    /// Iteration bound from the pipeline file.
    pub iterations: Option<u64>,
    /// Idle-iteration limit from the pipeline file.
    pub stall_limit: u32,
}

impl std::fmt::Debug for BuiltPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltPipeline")
            .field("blocks", &self.blocks)
            .field("sinks", &self.sinks.len())
            .field("iterations", &self.iterations)
            .field("stall_limit", &self.stall_limit)
            .finish_non_exhaustive()
    }
}

/// A block created from configuration, plus its collector handle if it is a
/// `vector_sink`.
pub struct CreatedBlock {
    /// The block, ready for [`Graph::add_block`].
    pub block: Box<dyn Block>,
    /// Collector handle for `vector_sink` blocks.
    pub sink: Option<SinkHandle<f32>>,
}

fn invalid(config: &BlockConfig, param: &str, reason: String) -> ValidationError {
    ValidationError::InvalidValue {
        block: config.block_type.clone(),
        param: param.to_string(),
        reason,
    }
}

fn count(config: &BlockConfig, name: &str) -> Result<Option<u64>, ValidationError> {
    config
        .param_or_default(name)
        .map(parse_count)
        .transpose()
        .map_err(|reason| invalid(config, name, reason))
}

fn factor(config: &BlockConfig, name: &str) -> Result<Option<f32>, ValidationError> {
    config
        .param_or_default(name)
        .map(parse_factor)
        .transpose()
        .map_err(|reason| invalid(config, name, reason))
}

fn flag(config: &BlockConfig, name: &str) -> Result<Option<bool>, ValidationError> {
    config
        .param_or_default(name)
        .map(parse_flag)
        .transpose()
        .map_err(|reason| invalid(config, name, reason))
}

fn required<T>(config: &BlockConfig, name: &str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::MissingParameter {
        block: config.block_type.clone(),
        param: name.to_string(),
    })
}

/// Instantiates one block from its configuration.
///
/// # Errors
///
/// Returns a validation error for unknown types or bad parameters.
pub fn create_block(config: &BlockConfig) -> Result<CreatedBlock, ConfigError> {
    validate_block(config)?;

    let mut sink = None;
    let block: Box<dyn Block> = match config.block_type.as_str() {
        "vector_source" => {
            let length = required(config, "length", count(config, "length")?)? as usize;
            let value = required(config, "value", factor(config, "value")?)?;
            let repeat = flag(config, "repeat")?.unwrap_or(false);
            let mut source = VectorSource::new(vec![value; length]).with_repeat(repeat);
            if let Some(every) = count(config, "tag_every")? {
                for index in (0..length).step_by(every.max(1) as usize) {
                    source = source.with_tag(index, "mark", index as u64);
                }
            }
            Box::new(source)
        }
        "null_source" => Box::new(NullSource::<f32>::new()),
        "multiply_const" => {
            let factor = required(config, "factor", factor(config, "factor")?)?;
            let multiple = count(config, "output_multiple")?.unwrap_or(0) as usize;
            Box::new(MultiplyConst::new(factor).with_output_multiple(multiple))
        }
        "head" => Box::new(Head::<f32>::new(required(config, "count", count(config, "count")?)?)),
        "vector_sink" => {
            let (block, handle) = VectorSink::<f32>::new();
            sink = Some(handle);
            Box::new(block)
        }
        "null_sink" => Box::new(NullSink::<f32>::new()),
        other => return Err(ValidationError::UnknownBlock(other.to_string()).into()),
    };

    Ok(CreatedBlock { block, sink })
}

/// Validates `pipeline` and builds its graph and executor.
///
/// # Errors
///
/// Returns validation errors for the pipeline as a whole, then any buffer
/// or graph construction failure.
pub fn build_pipeline(pipeline: &PipelineConfig) -> Result<BuiltPipeline, ConfigError> {
    validate_pipeline(pipeline)?;

    let context = RuntimeContext::new(pipeline.name.clone());
    let mut graph = Graph::new(context).with_buffer_properties(pipeline.buffer.to_properties());

    let mut blocks = Vec::with_capacity(pipeline.len());
    let mut sinks = Vec::new();
    for config in &pipeline.blocks {
        let created = create_block(config)?;
        let id = graph.add_block(created.block);
        if let Some(handle) = created.sink {
            sinks.push((id, handle));
        }
        blocks.push((id, config.block_type.clone()));
    }

    for (i, pair) in blocks.windows(2).enumerate() {
        let (src, dst) = (pair[0].0, pair[1].0);
        match &pipeline.blocks[i].buffer {
            Some(over) => {
                let props = pipeline.buffer.merged(over).to_properties();
                graph.connect_with(src, 0, dst, 0, &props)?;
            }
            None => {
                graph.connect(src, 0, dst, 0)?;
            }
        }
    }

    let mut executor = GraphExecutor::new(graph)?;
    if let Some(items) = pipeline.min_items_to_process {
        executor = executor.with_min_items_to_process(items);
    }

    Ok(BuiltPipeline {
        executor,
        blocks,
        sinks,
        iterations: pipeline.iterations,
        stall_limit: pipeline.stall_limit,
    })
}
