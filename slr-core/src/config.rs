//! Configuration types for encoding, vector sources and search
//!
//! `QuantizationConfig` is index-wide: the exact same value must be used to
//! encode postings and to decode them at query time, so it is persisted as
//! JSON next to the index (`quantization.json`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the persisted quantization config inside an index directory
pub const QUANTIZATION_FILENAME: &str = "quantization.json";

/// Decimal digits retained by default (multiplier 10^9)
pub const DEFAULT_PRECISION: u32 = 9;

/// Largest precision whose fractional weights fit the u32 weight channel
pub const MAX_PRECISION: u32 = 9;

pub const DEFAULT_DIMENSIONALITY: u32 = 10_000;

/// Widest dimension token (decimal digits of u32::MAX)
const MAX_TOKEN_WIDTH: usize = 10;

/// Fixed-point quantization settings shared by encode and decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    /// Number of decimal digits kept after the decimal point
    precision: u32,
    /// Number of dimensions `D`; valid dimension indices are `0..D`
    dimensionality: u32,
    /// Width of the zero-padded dimension token
    token_width: usize,
}

impl QuantizationConfig {
    /// Create a config with the narrowest token width covering `dimensionality`
    pub fn new(precision: u32, dimensionality: u32) -> Result<Self> {
        let config = Self {
            precision,
            dimensionality,
            token_width: decimal_digits(dimensionality.saturating_sub(1)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the token width (must still cover every dimension index)
    pub fn with_token_width(mut self, token_width: usize) -> Result<Self> {
        self.token_width = token_width;
        self.validate()?;
        Ok(self)
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// `10^precision`
    pub fn multiplier(&self) -> u32 {
        10u32.pow(self.precision)
    }

    pub fn dimensionality(&self) -> u32 {
        self.dimensionality
    }

    pub fn token_width(&self) -> usize {
        self.token_width
    }

    /// Largest weight produced by an activation in `[0, 1)`
    pub fn max_fraction_weight(&self) -> u32 {
        self.multiplier() - 1
    }

    /// Reject configs that could not encode or decode consistently
    pub fn validate(&self) -> Result<()> {
        if self.precision == 0 || self.precision > MAX_PRECISION {
            return Err(Error::Config(format!(
                "precision must be in 1..={}, got {}",
                MAX_PRECISION, self.precision
            )));
        }
        if self.dimensionality == 0 {
            return Err(Error::Config("dimensionality must be at least 1".into()));
        }
        let needed = decimal_digits(self.dimensionality - 1);
        if self.token_width < needed || self.token_width > MAX_TOKEN_WIDTH {
            return Err(Error::Config(format!(
                "token width {} cannot represent dimensions up to {} (needs {}..={})",
                self.token_width,
                self.dimensionality - 1,
                needed,
                MAX_TOKEN_WIDTH
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist into an index directory
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::write(dir.join(QUANTIZATION_FILENAME), self.to_json()?)?;
        Ok(())
    }

    /// Load from an index directory
    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(QUANTIZATION_FILENAME))?;
        Self::from_json(&json)
    }
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            dimensionality: DEFAULT_DIMENSIONALITY,
            token_width: decimal_digits(DEFAULT_DIMENSIONALITY - 1),
        }
    }
}

/// Number of decimal digits needed to print `n`
fn decimal_digits(n: u32) -> usize {
    n.checked_ilog10().map(|d| d as usize + 1).unwrap_or(1)
}

/// External command that turns raw text into a sparse vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Program to execute
    pub program: String,
    /// Leading arguments; `-content <text>` is appended after them
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts after a failed one
    #[serde(default)]
    pub retries: u32,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: default_timeout_ms(),
            retries: 0,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Where sparse vectors come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VectorSourceConfig {
    /// `dim:value dim:value ...` text
    #[default]
    Literal,
    /// External process invoked with `-content <text>`
    Process(ProcessConfig),
    /// Precomputed TSV file: `doc_id \t v0 \t v1 ...`
    File { path: PathBuf },
    /// The content itself is a whitespace separated dense row
    Contents,
}

/// Index-time document options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Postings per block (bounds granularity for block-max pruning)
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Store the string form of each vector in the stored record
    #[serde(default)]
    pub store_slr: bool,
    /// Store the raw source content in the stored record
    #[serde(default)]
    pub store_raw: bool,
    /// Keep an exact packed copy of each vector
    #[serde(default)]
    pub store_exact: bool,
}

fn default_block_size() -> usize {
    crate::postings::BLOCK_SIZE
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            store_slr: false,
            store_raw: false,
            store_exact: false,
        }
    }
}

/// Query-time settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of hits to return
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Pruning factor: 1.0 = exact, lower prunes more aggressively
    #[serde(default = "default_heap_factor")]
    pub heap_factor: f32,
    /// Keep only the N query dimensions with the largest |weight|
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_query_dims: Option<usize>,
    /// Drop query dimensions with |weight| below this
    #[serde(default)]
    pub weight_threshold: f32,
}

fn default_top_k() -> usize {
    1000
}

fn default_heap_factor() -> f32 {
    1.0
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            heap_factor: default_heap_factor(),
            max_query_dims: None,
            weight_threshold: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_width_from_dimensionality() {
        assert_eq!(QuantizationConfig::new(7, 10_000).unwrap().token_width(), 4);
        assert_eq!(QuantizationConfig::new(7, 10_001).unwrap().token_width(), 5);
        assert_eq!(QuantizationConfig::new(7, 1).unwrap().token_width(), 1);
        assert_eq!(QuantizationConfig::new(7, 30_522).unwrap().token_width(), 5);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(
            QuantizationConfig::new(0, 100),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            QuantizationConfig::new(10, 100),
            Err(Error::Config(_))
        ));
        assert!(matches!(QuantizationConfig::new(7, 0), Err(Error::Config(_))));

        let config = QuantizationConfig::new(7, 100_000).unwrap();
        assert!(config.with_token_width(4).is_err());
        assert_eq!(config.with_token_width(6).unwrap().token_width(), 6);
    }

    #[test]
    fn test_multiplier() {
        let config = QuantizationConfig::new(7, 1000).unwrap();
        assert_eq!(config.multiplier(), 10_000_000);
        assert_eq!(config.max_fraction_weight(), 9_999_999);
        assert_eq!(QuantizationConfig::default().multiplier(), 1_000_000_000);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = QuantizationConfig::new(6, 30_522).unwrap();
        config.save(dir.path()).unwrap();
        assert_eq!(QuantizationConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_json_config() {
        let json = r#"{"precision": 12, "dimensionality": 100, "token_width": 2}"#;
        assert!(QuantizationConfig::from_json(json).is_err());
    }

    #[test]
    fn test_vector_source_config_serde() {
        let json = r#"{"kind": "process", "program": "python3", "args": ["model.py"], "retries": 2}"#;
        let config: VectorSourceConfig = serde_json::from_str(json).unwrap();
        match config {
            VectorSourceConfig::Process(p) => {
                assert_eq!(p.program, "python3");
                assert_eq!(p.args, vec!["model.py".to_string()]);
                assert_eq!(p.timeout_ms, 30_000);
                assert_eq!(p.retries, 2);
            }
            other => panic!("unexpected config: {:?}", other),
        }

        let literal: VectorSourceConfig = serde_json::from_str(r#"{"kind": "literal"}"#).unwrap();
        assert_eq!(literal, VectorSourceConfig::Literal);
    }

    #[test]
    fn test_search_config_defaults() {
        let config: SearchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.top_k, 1000);
        assert_eq!(config.heap_factor, 1.0);
    }
}
