//! Pipeline file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::block_config::BlockConfig;
use crate::buffer_config::BufferConfig;
use crate::error::ConfigError;
use crate::factory::{BuiltPipeline, build_pipeline};
use crate::validation::validate_pipeline;

/// Default number of consecutive idle iterations before a run gives up.
pub const DEFAULT_STALL_LIMIT: u32 = 16;

/// A linear chain of blocks and the buffers between them.
///
/// Pipelines are stored as TOML files. Block `i` feeds block `i + 1`; the
/// first block must be a source and the last a sink.
///
/// # TOML Format
///
/// ```toml
/// name = "tone-to-sink"
/// iterations = 100
///
/// [buffer]
/// buffer_size = 8192
/// max_buffer_fill = 1024
///
/// [[blocks]]
/// type = "vector_source"
/// [blocks.params]
/// length = "4096"
///
/// [[blocks]]
/// type = "multiply_const"
/// [blocks.params]
/// factor = "0.5"
/// output_multiple = "64"
///
/// [[blocks]]
/// type = "vector_sink"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Name of the pipeline, also used as the runtime context name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Upper bound on executor iterations; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    /// Consecutive iterations without progress after which a run stops.
    #[serde(default = "default_stall_limit")]
    pub stall_limit: u32,

    /// Executor floor on items per work call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items_to_process: Option<usize>,

    /// Buffer settings applied to every edge.
    #[serde(default, skip_serializing_if = "BufferConfig::is_empty")]
    pub buffer: BufferConfig,

    /// Blocks in chain order.
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
}

fn default_stall_limit() -> u32 {
    DEFAULT_STALL_LIMIT
}

impl PipelineConfig {
    /// Create a new empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            iterations: None,
            stall_limit: DEFAULT_STALL_LIMIT,
            min_items_to_process: None,
            buffer: BufferConfig::default(),
            blocks: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bound the number of iterations.
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Set the idle-iteration limit.
    pub fn with_stall_limit(mut self, stall_limit: u32) -> Self {
        self.stall_limit = stall_limit;
        self
    }

    /// Set the pipeline-wide buffer settings.
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Append a block to the chain.
    pub fn with_block(mut self, block: BlockConfig) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append several blocks to the chain.
    pub fn with_blocks(mut self, blocks: impl IntoIterator<Item = BlockConfig>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    /// Load a pipeline from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a pipeline from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the pipeline to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the pipeline to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the pipeline has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block type names in chain order.
    pub fn block_types(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.block_type.as_str()).collect()
    }

    /// Runs [`validate_pipeline`] on this pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pipeline(self)?;
        Ok(())
    }

    /// Validates the pipeline and wires it into a ready-to-run executor.
    pub fn build(&self) -> Result<BuiltPipeline, ConfigError> {
        build_pipeline(self)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new("untitled")
    }
}
