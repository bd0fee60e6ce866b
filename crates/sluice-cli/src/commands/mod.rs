//! CLI command implementations.

pub mod blocks;
pub mod describe;
pub mod run;
pub mod validate;
