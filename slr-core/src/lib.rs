//! SLR - sparse latent representation retrieval core
//!
//! Sparse activation vectors are indexed with inverted-index machinery: every
//! non-zero dimension becomes a term, and relevance is an approximate dot
//! product reconstructed from integer posting weights at query time.
//!
//! This crate provides:
//! - Quantizing codec: float activation -> zero-padded dimension token + integer weight
//! - Exact, order-preserving 12-byte record packing for verbatim vector storage
//! - Literal / external-process / file vector sources
//! - Block posting lists with per-block max weights
//! - Dot-product dimension scorers with impact bounds
//! - Block-Max WAND top-k execution over disjunctive sparse queries

pub mod analysis;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod pack;
pub mod postings;
pub mod query;
pub mod source;
pub mod vector;

pub use analysis::{SlrTokenizer, Token, render_content};
pub use codec::{EncodedTerm, VectorCodec};
pub use config::{
    IndexConfig, ProcessConfig, QUANTIZATION_FILENAME, QuantizationConfig, SearchConfig,
    VectorSourceConfig,
};
pub use document::{DocumentEncoder, EncodedDocument, StoredRecord};
pub use error::{Error, Result};
pub use index::{IndexBuilder, MemoryIndex};
pub use postings::{BlockPostingIterator, BlockPostingList, PostingReader, PostingSource};
pub use query::{
    BlockMaxExecutor, DimensionQuery, DimensionScorer, ImpactScorer, QueryBuilder, ScoreCollector,
    ScoredDoc, SparseOrQuery, exhaustive_top_k,
};
pub use source::{
    ContentsSource, LiteralSource, ProcessSource, TsvVectorFile, VectorSource, source_from_config,
};
pub use vector::{QueryVector, SparseVector, dense_dot};

pub type DocId = u32;
pub type Weight = u32;
pub type Score = f32;

/// Sentinel doc id returned by exhausted iterators
pub const TERMINATED: DocId = u32::MAX;
