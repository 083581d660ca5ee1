//! Disjunctive sparse query construction

use std::fmt;

use log::debug;

use super::{BlockMaxExecutor, DimensionScorer, ScoredDoc, exhaustive_top_k};
use crate::codec::VectorCodec;
use crate::config::{QuantizationConfig, SearchConfig};
use crate::error::{Error, Result};
use crate::postings::PostingReader;
use crate::vector::{QueryVector, parse_literal};

/// One SHOULD clause: a dimension token with its query-side weight
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionQuery {
    pub dimension: u32,
    pub token: String,
    pub weight: f32,
}

/// OR over dimension clauses, scored as a sparse dot product
#[derive(Debug, Clone)]
pub struct SparseOrQuery {
    clauses: Vec<DimensionQuery>,
    quantization: QuantizationConfig,
    heap_factor: f32,
}

impl SparseOrQuery {
    pub fn clauses(&self) -> &[DimensionQuery] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn heap_factor(&self) -> f32 {
        self.heap_factor
    }

    /// One scorer per clause whose token has postings in `reader`
    pub fn scorers<'r, R: PostingReader>(
        &self,
        reader: &'r R,
    ) -> Result<Vec<DimensionScorer<R::Source<'r>>>> {
        if reader.quantization() != &self.quantization {
            return Err(Error::Config(format!(
                "query built for {:?} but index uses {:?}",
                self.quantization,
                reader.quantization()
            )));
        }
        let multiplier = reader.quantization().multiplier();

        let scorers: Vec<_> = self
            .clauses
            .iter()
            .filter_map(|clause| {
                let postings = reader.postings(&clause.token);
                if postings.is_none() {
                    debug!("no postings for dimension {}", clause.dimension);
                }
                postings.map(|p| DimensionScorer::new(p, clause.weight, multiplier))
            })
            .collect();
        Ok(scorers)
    }

    /// Top-k with block-max pruning
    pub fn search<R: PostingReader>(&self, reader: &R, k: usize) -> Result<Vec<ScoredDoc>> {
        let scorers = self.scorers(reader)?;
        debug!(
            "SparseOrQuery: {} clauses, {} with postings, k={}",
            self.clauses.len(),
            scorers.len(),
            k
        );
        Ok(BlockMaxExecutor::with_heap_factor(scorers, k, self.heap_factor).execute())
    }

    /// Top-k without pruning (reference scan)
    pub fn search_exhaustive<R: PostingReader>(
        &self,
        reader: &R,
        k: usize,
    ) -> Result<Vec<ScoredDoc>> {
        Ok(exhaustive_top_k(self.scorers(reader)?, k))
    }
}

impl fmt::Display for SparseOrQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SparseOr(")?;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", clause.token, clause.weight)?;
        }
        write!(f, ")")
    }
}

/// Builds a [`SparseOrQuery`] from a query vector
///
/// ```text
/// 3:0.9 50:0.89  ->  SparseOr(0003:0.9 0050:0.89)
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    codec: VectorCodec,
    max_query_dims: Option<usize>,
    weight_threshold: f32,
    heap_factor: f32,
}

impl QueryBuilder {
    pub fn new(quantization: QuantizationConfig) -> Self {
        Self {
            codec: VectorCodec::new(quantization),
            max_query_dims: None,
            weight_threshold: 0.0,
            heap_factor: 1.0,
        }
    }

    pub fn from_search_config(quantization: QuantizationConfig, config: &SearchConfig) -> Self {
        Self {
            codec: VectorCodec::new(quantization),
            max_query_dims: config.max_query_dims,
            weight_threshold: config.weight_threshold,
            heap_factor: config.heap_factor,
        }
    }

    /// Keep only the N dimensions with the largest |weight|
    pub fn with_max_query_dims(mut self, max_dims: usize) -> Self {
        self.max_query_dims = Some(max_dims);
        self
    }

    /// Drop dimensions with |weight| below the threshold
    pub fn with_weight_threshold(mut self, threshold: f32) -> Self {
        self.weight_threshold = threshold;
        self
    }

    pub fn with_heap_factor(mut self, heap_factor: f32) -> Self {
        self.heap_factor = heap_factor;
        self
    }

    pub fn build(&self, vector: &QueryVector) -> Result<SparseOrQuery> {
        let mut entries: Vec<(u32, f32)> = vector
            .iter()
            .map(|(dimension, value)| (dimension, value as f32))
            .filter(|&(_, weight)| weight != 0.0 && weight.abs() >= self.weight_threshold)
            .collect();

        if let Some(max_dims) = self.max_query_dims
            && entries.len() > max_dims
        {
            // Largest |weight| first, lower dimension on ties
            entries.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));
            entries.truncate(max_dims);
            entries.sort_by_key(|&(dimension, _)| dimension);
        }

        let clauses = entries
            .into_iter()
            .map(|(dimension, weight)| {
                Ok(DimensionQuery {
                    dimension,
                    token: self.codec.token(dimension)?,
                    weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Built sparse query: {} of {} dimensions kept",
            clauses.len(),
            vector.len()
        );

        Ok(SparseOrQuery {
            clauses,
            quantization: *self.codec.config(),
            heap_factor: self.heap_factor,
        })
    }

    /// Parse `dim:value dim:value ...` and build
    pub fn build_literal(&self, text: &str) -> Result<SparseOrQuery> {
        self.build(&parse_literal(text)?)
    }
}
