//! Block configuration types and parameter parsing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::buffer_config::BufferConfig;
use crate::validation::{BlockInfo, find_block};

/// Configuration for a single block in a pipeline.
///
/// # Example
///
/// ```rust
/// use sluice_config::{BlockConfig, BufferConfig};
///
/// let config = BlockConfig::new("multiply_const")
///     .with_param("factor", "-6dB")
///     .with_buffer(BufferConfig::new().with_buffer_size(2048));
///
/// assert_eq!(config.block_type, "multiply_const");
/// assert_eq!(config.get_param("factor"), Some("-6dB"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BlockConfig {
    /// Block type name (e.g., "vector_source", "head").
    #[serde(rename = "type")]
    pub block_type: String,

    /// Parameters as key-value pairs.
    /// Values are strings so units and suffixes survive the round trip.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Buffer settings for this block's output, layered over the pipeline's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<BufferConfig>,
}

impl BlockConfig {
    /// Create a new block configuration with no parameters.
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            params: BTreeMap::new(),
            buffer: None,
        }
    }

    /// Add a parameter to the configuration.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Override the buffer settings of this block's output.
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Get a parameter value as written.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Set a parameter value.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Parameter value, falling back to the block type's default.
    pub fn param_or_default(&self, key: &str) -> Option<&str> {
        self.get_param(key).or_else(|| {
            self.info()?
                .params
                .iter()
                .find(|p| p.name == key)
                .and_then(|p| p.default)
        })
    }

    /// Static description of this block type, if known.
    pub fn info(&self) -> Option<&'static BlockInfo> {
        find_block(&self.block_type)
    }
}

/// Parse an item count.
///
/// Accepts plain integers with optional `_` separators ("16_384") and the
/// binary suffixes `Ki` and `Mi` ("64Ki" is 65536).
pub fn parse_count(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (digits, scale) = if let Some(n) = value.strip_suffix("Ki") {
        (n, 1u64 << 10)
    } else if let Some(n) = value.strip_suffix("Mi") {
        (n, 1u64 << 20)
    } else {
        (value, 1)
    };
    let digits: String = digits.trim().chars().filter(|&c| c != '_').collect();
    let n = digits
        .parse::<u64>()
        .map_err(|e| format!("'{value}' is not a count: {e}"))?;
    n.checked_mul(scale)
        .ok_or_else(|| format!("'{value}' overflows"))
}

/// Parse a scalar factor.
///
/// Supports:
/// - Plain numbers: "0.5", "-2"
/// - Percentages: "50%" (divided by 100)
/// - Decibels: "-6dB" (converted to linear gain)
pub fn parse_factor(value: &str) -> Result<f32, String> {
    let value = value.trim();

    let parsed = if let Some(pct) = value.strip_suffix('%') {
        pct.trim().parse::<f32>().map(|v| v / 100.0)
    } else if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        db.trim().parse::<f32>().map(|v| 10f32.powf(v / 20.0))
    } else {
        value.parse::<f32>()
    };

    match parsed {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("'{value}' is not finite")),
        Err(e) => Err(format!("'{value}' is not a number: {e}")),
    }
}

/// Parse a boolean flag ("true"/"false", "yes"/"no", "on"/"off", "1"/"0").
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("'{other}' is not a flag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_params_and_buffer() {
        let config = BlockConfig::new("head")
            .with_param("count", "100")
            .with_buffer(BufferConfig::new().with_max_buffer_fill(64));
        assert_eq!(config.get_param("count"), Some("100"));
        assert_eq!(
            config.buffer.as_ref().and_then(|b| b.max_buffer_fill),
            Some(64)
        );
    }

    #[test]
    fn defaults_fill_missing_params() {
        let config = BlockConfig::new("vector_source");
        assert_eq!(config.param_or_default("length"), Some("1024"));
        assert_eq!(config.param_or_default("nonexistent"), None);

        let config = config.with_param("length", "8");
        assert_eq!(config.param_or_default("length"), Some("8"));
    }

    #[test]
    fn unknown_type_has_no_info() {
        assert!(BlockConfig::new("fft").info().is_none());
        assert!(BlockConfig::new("head").info().is_some());
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count("4096"), Ok(4096));
        assert_eq!(parse_count(" 16_384 "), Ok(16384));
        assert_eq!(parse_count("64Ki"), Ok(65536));
        assert_eq!(parse_count("1Mi"), Ok(1 << 20));
        assert!(parse_count("-1").is_err());
        assert!(parse_count("lots").is_err());
    }

    #[test]
    fn factors() {
        assert_eq!(parse_factor("0.5"), Ok(0.5));
        assert_eq!(parse_factor("50%"), Ok(0.5));
        let gain = parse_factor("-6dB").unwrap();
        assert!((gain - 0.501).abs() < 1e-3, "got {gain}");
        assert!(parse_factor("inf").is_err());
        assert!(parse_factor("loud").is_err());
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("yes"), Ok(true));
        assert_eq!(parse_flag("OFF"), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn toml_uses_type_key() {
        let config: BlockConfig = toml::from_str(
            r#"
            type = "multiply_const"
            [params]
            factor = "2"
            "#,
        )
        .unwrap();
        assert_eq!(config.block_type, "multiply_const");
        assert_eq!(config.get_param("factor"), Some("2"));
        assert!(config.buffer.is_none());
    }
}
