//! Sparse activation vectors
//!
//! A `SparseVector` maps dimension indices to non-zero activations. Zero
//! entries are never stored: inserting a zero removes the dimension.

mod parse;

pub use parse::{parse_contents, parse_dense_row, parse_literal, parse_process_output};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordered dimension -> activation map without zero entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: BTreeMap<u32, f64>,
}

/// Query vectors have the same shape as document vectors
pub type QueryVector = SparseVector;

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (dimension, value) pairs; zeros are dropped, later pairs win
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut vector = Self::new();
        for (dim, value) in pairs {
            vector.insert(dim, value);
        }
        vector
    }

    /// Build from a dense row: dimension = position
    pub fn from_dense(values: &[f64]) -> Self {
        Self::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(dim, &value)| (dim as u32, value)),
        )
    }

    /// Set a dimension. A zero value removes it. Returns the previous value.
    pub fn insert(&mut self, dimension: u32, value: f64) -> Option<f64> {
        if value == 0.0 {
            self.entries.remove(&dimension)
        } else {
            self.entries.insert(dimension, value)
        }
    }

    /// Activation at `dimension`, 0.0 when absent
    pub fn get(&self, dimension: u32) -> f64 {
        self.entries.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, dimension: u32) -> bool {
        self.entries.contains_key(&dimension)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending dimension order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.entries.iter().map(|(&dim, &value)| (dim, value))
    }

    /// Largest dimension index, if any
    pub fn max_dimension(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// Fail if any dimension is outside `0..dimensionality`
    pub fn check_dimensionality(&self, dimensionality: u32) -> Result<()> {
        match self.max_dimension() {
            Some(dim) if dim >= dimensionality => Err(Error::DimensionOutOfRange {
                dimension: dim as u64,
                dimensionality,
            }),
            _ => Ok(()),
        }
    }

    /// Brute-force sparse dot product; missing entries are zero on both sides
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .entries
            .iter()
            .filter_map(|(dim, a)| large.entries.get(dim).map(|b| a * b))
            .sum()
    }

    /// Entries narrowed to f32, the query weight precision used by scorers
    pub fn to_f32_pairs(&self) -> Vec<(u32, f32)> {
        self.iter().map(|(dim, value)| (dim, value as f32)).collect()
    }
}

impl FromIterator<(u32, f64)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Literal form: `dim:value dim:value ...`, which `parse_literal` reads back
impl fmt::Display for SparseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (dim, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", dim, value)?;
        }
        Ok(())
    }
}

/// Dense dot product; both rows must have the same dimensionality
pub fn dense_dot(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}
