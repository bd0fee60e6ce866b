//! Block catalog and pipeline validation.
//!
//! Every block type a pipeline file may name is described by a static
//! [`BlockInfo`]: its role in a linear chain and the parameters it accepts.
//! Validation checks block types, parameter names and values, buffer bounds
//! and the chain shape (a source first, a sink last, processors between).
//!
//! # Example
//!
//! ```rust
//! use sluice_config::{BlockConfig, PipelineConfig, validate_pipeline};
//!
//! let pipeline = PipelineConfig::new("ok")
//!     .with_block(BlockConfig::new("null_source"))
//!     .with_block(BlockConfig::new("head").with_param("count", "1000"))
//!     .with_block(BlockConfig::new("null_sink"));
//! validate_pipeline(&pipeline).expect("valid chain");
//! ```

use std::fmt;

use thiserror::Error;

use crate::block_config::{BlockConfig, parse_count, parse_factor, parse_flag};
use crate::buffer_config::BufferConfig;
use crate::pipeline::PipelineConfig;

/// Size of the items flowing through configured pipelines (`f32`).
pub const ITEM_SIZE: usize = std::mem::size_of::<f32>();

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown block type.
    #[error("unknown block type: {0}")]
    UnknownBlock(String),

    /// Unknown parameter name.
    #[error("unknown parameter '{param}' for block '{block}'")]
    UnknownParameter {
        /// Block type.
        block: String,
        /// Name of the unrecognized parameter.
        param: String,
    },

    /// A required parameter is absent.
    #[error("block '{block}' requires parameter '{param}'")]
    MissingParameter {
        /// Block type.
        block: String,
        /// Name of the missing parameter.
        param: String,
    },

    /// A parameter value does not parse or is out of range.
    #[error("invalid value for '{param}' on block '{block}': {reason}")]
    InvalidValue {
        /// Block type.
        block: String,
        /// Name of the parameter.
        param: String,
        /// Description of the problem.
        reason: String,
    },

    /// Buffer settings cannot produce a buffer.
    #[error("invalid buffer settings for {scope}: {reason}")]
    InvalidBuffer {
        /// "pipeline" or the block position, e.g. "block 2 (head)".
        scope: String,
        /// Description of the problem.
        reason: String,
    },

    /// The blocks do not form a source → processors → sink chain.
    #[error("invalid pipeline shape: {0}")]
    Shape(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", join(.0))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Position a block type may take in a linear chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    /// No inputs, one output.
    Source,
    /// One input, one output.
    Processor,
    /// One input, no outputs.
    Sink,
}

impl fmt::Display for BlockRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRole::Source => write!(f, "source"),
            BlockRole::Processor => write!(f, "processor"),
            BlockRole::Sink => write!(f, "sink"),
        }
    }
}

/// How a parameter value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Non-negative item count, see [`parse_count`].
    Count,
    /// Count that must be at least one.
    PositiveCount,
    /// Finite scalar, see [`parse_factor`].
    Factor,
    /// Boolean, see [`parse_flag`].
    Flag,
}

/// Parameter metadata for validation and `describe` output.
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    /// Parameter name.
    pub name: &'static str,
    /// Value format.
    pub kind: ParamKind,
    /// Whether the parameter must be given.
    pub required: bool,
    /// Value used when the parameter is omitted.
    pub default: Option<&'static str>,
    /// One-line description.
    pub description: &'static str,
}

/// Static description of a block type.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    /// Type name used in pipeline files.
    pub name: &'static str,
    /// Chain position.
    pub role: BlockRole,
    /// One-line description.
    pub description: &'static str,
    /// Accepted parameters.
    pub params: &'static [ParamInfo],
}

const fn param(
    name: &'static str,
    kind: ParamKind,
    default: Option<&'static str>,
    description: &'static str,
) -> ParamInfo {
    ParamInfo {
        name,
        kind,
        required: false,
        default,
        description,
    }
}

const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> ParamInfo {
    ParamInfo {
        name,
        kind,
        required: true,
        default: None,
        description,
    }
}

/// Every block type a pipeline file may use.
pub const BLOCKS: &[BlockInfo] = &[
    BlockInfo {
        name: "vector_source",
        role: BlockRole::Source,
        description: "Emits a constant vector, once or repeatedly",
        params: &[
            param("length", ParamKind::Count, Some("1024"), "Items per pass"),
            param("value", ParamKind::Factor, Some("1.0"), "Value of every item"),
            param("repeat", ParamKind::Flag, Some("false"), "Restart after the last item"),
            param("tag_every", ParamKind::PositiveCount, None, "Tag every Nth item with \"mark\""),
        ],
    },
    BlockInfo {
        name: "null_source",
        role: BlockRole::Source,
        description: "Emits zeros without end",
        params: &[],
    },
    BlockInfo {
        name: "multiply_const",
        role: BlockRole::Processor,
        description: "Scales every item by a constant",
        params: &[
            required("factor", ParamKind::Factor, "Scale factor (\"0.5\", \"50%\", \"-6dB\")"),
            param(
                "output_multiple",
                ParamKind::Count,
                Some("0"),
                "Produce multiples of N items (0 = any)",
            ),
        ],
    },
    BlockInfo {
        name: "head",
        role: BlockRole::Processor,
        description: "Passes the first N items, then reports done",
        params: &[required("count", ParamKind::Count, "Items to pass")],
    },
    BlockInfo {
        name: "vector_sink",
        role: BlockRole::Sink,
        description: "Collects items and tags",
        params: &[],
    },
    BlockInfo {
        name: "null_sink",
        role: BlockRole::Sink,
        description: "Discards items",
        params: &[],
    },
];

/// Looks up a block type by name.
pub fn find_block(name: &str) -> Option<&'static BlockInfo> {
    BLOCKS.iter().find(|info| info.name == name)
}

/// Names of every known block type.
pub fn block_types() -> impl Iterator<Item = &'static str> {
    BLOCKS.iter().map(|info| info.name)
}

/// Checks a raw parameter value against its kind.
pub fn validate_param_value(
    block: &str,
    info: &ParamInfo,
    value: &str,
) -> ValidationResult<()> {
    let invalid = |reason: String| ValidationError::InvalidValue {
        block: block.to_string(),
        param: info.name.to_string(),
        reason,
    };
    let checked = match info.kind {
        ParamKind::Count => parse_count(value).map(|_| ()),
        ParamKind::PositiveCount => match parse_count(value) {
            Ok(0) => Err("must be at least 1".to_string()),
            other => other.map(|_| ()),
        },
        ParamKind::Factor => parse_factor(value).map(|_| ()),
        ParamKind::Flag => parse_flag(value).map(|_| ()),
    };
    checked.map_err(invalid)
}

/// Validates one block: known type, known and well-formed parameters, and
/// all required parameters present.
pub fn validate_block(config: &BlockConfig) -> ValidationResult<()> {
    let info = find_block(&config.block_type)
        .ok_or_else(|| ValidationError::UnknownBlock(config.block_type.clone()))?;

    let mut errors = Vec::new();
    for (key, value) in &config.params {
        match info.params.iter().find(|p| p.name == key.as_str()) {
            Some(param) => {
                if let Err(e) = validate_param_value(info.name, param, value) {
                    errors.push(e);
                }
            }
            None => errors.push(ValidationError::UnknownParameter {
                block: info.name.to_string(),
                param: key.clone(),
            }),
        }
    }
    for param in info.params.iter().filter(|p| p.required) {
        if !config.params.contains_key(param.name) {
            errors.push(ValidationError::MissingParameter {
                block: info.name.to_string(),
                param: param.name.to_string(),
            });
        }
    }
    collect(errors)
}

fn validate_buffer(scope: String, config: &BufferConfig) -> ValidationResult<()> {
    config
        .resolve_capacity(ITEM_SIZE)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidBuffer {
            scope,
            reason: e.to_string(),
        })
}

/// Validates a whole pipeline, reporting every problem found.
pub fn validate_pipeline(pipeline: &PipelineConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if pipeline.blocks.len() < 2 {
        errors.push(ValidationError::Shape(format!(
            "need at least a source and a sink, found {} block(s)",
            pipeline.blocks.len()
        )));
    }

    if let Err(e) = validate_buffer("pipeline".to_string(), &pipeline.buffer) {
        errors.push(e);
    }

    let last = pipeline.blocks.len().saturating_sub(1);
    for (i, block) in pipeline.blocks.iter().enumerate() {
        match validate_block(block) {
            Ok(()) => {}
            Err(ValidationError::Multiple(inner)) => errors.extend(inner),
            Err(e) => errors.push(e),
        }
        if let Some(buffer) = &block.buffer {
            let scope = format!("block {i} ({})", block.block_type);
            if let Err(e) = validate_buffer(scope, &pipeline.buffer.merged(buffer)) {
                errors.push(e);
            }
        }

        let Some(info) = block.info() else { continue };
        let expected = if i == 0 {
            BlockRole::Source
        } else if i == last {
            BlockRole::Sink
        } else {
            BlockRole::Processor
        };
        if info.role != expected {
            errors.push(ValidationError::Shape(format!(
                "block {i} ({}) is a {}, expected a {expected}",
                info.name, info.role
            )));
        }
    }

    collect(errors)
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
