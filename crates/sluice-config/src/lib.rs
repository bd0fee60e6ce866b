//! Pipeline configuration for sluice.
//!
//! This crate describes linear block pipelines in TOML, validates them
//! against a catalog of known block types, and wires them into a
//! [`GraphExecutor`](sluice_core::GraphExecutor).
//!
//! # Features
//!
//! - **Pipeline files**: load and save [`PipelineConfig`] as TOML
//! - **Buffer settings**: pipeline-wide [`BufferConfig`] with per-block overrides
//! - **Validation**: block types, parameters, buffer bounds and chain shape
//! - **Factory**: build the graph and executor in one call
//!
//! # Example
//!
//! ```rust
//! use sluice_config::{BlockConfig, BufferConfig, PipelineConfig};
//!
//! let pipeline = PipelineConfig::new("half-gain")
//!     .with_buffer(BufferConfig::new().with_buffer_size(4096))
//!     .with_block(BlockConfig::new("vector_source").with_param("length", "512"))
//!     .with_block(BlockConfig::new("multiply_const").with_param("factor", "50%"))
//!     .with_block(BlockConfig::new("vector_sink"));
//!
//! let mut built = pipeline.build()?;
//! for _ in 0..8 {
//!     built.executor.run_one_iteration();
//! }
//! let (_, sink) = &built.sinks[0];
//! assert_eq!(sink.len(), 512);
//! assert!(sink.items().iter().all(|&x| x == 0.5));
//! # Ok::<(), sluice_config::ConfigError>(())
//! ```

mod block_config;
mod buffer_config;
mod error;
mod pipeline;

/// Graph construction from configuration.
pub mod factory;

/// Block catalog and validation.
pub mod validation;

pub use block_config::{BlockConfig, parse_count, parse_factor, parse_flag};
pub use buffer_config::BufferConfig;
pub use error::ConfigError;
pub use factory::{BuiltPipeline, CreatedBlock, build_pipeline, create_block};
pub use pipeline::{DEFAULT_STALL_LIMIT, PipelineConfig};
pub use validation::{
    BLOCKS, BlockInfo, BlockRole, ITEM_SIZE, ParamInfo, ParamKind, ValidationError,
    ValidationResult, block_types, find_block, validate_block, validate_pipeline,
};
