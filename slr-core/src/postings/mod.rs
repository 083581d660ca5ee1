//! Posting lists for encoded sparse vector terms
//!
//! The scoring core only needs the [`PostingSource`] capability: a cursor over
//! `(doc_id, weight)` postings in doc order that also exposes block-level
//! maximum weights for impact-bounded pruning. [`BlockPostingList`] is the
//! in-memory implementation; any storage engine can provide its own.

mod block;

pub use block::{BlockPostingIterator, BlockPostingList, PostingBlock};

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::config::QuantizationConfig;
use crate::{DocId, Weight};

/// Default number of postings per block
pub const BLOCK_SIZE: usize = 128;

/// Summary of one block: doc range and max weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBounds {
    pub first_doc: DocId,
    pub last_doc: DocId,
    pub max_weight: Weight,
}

/// Doc-ordered posting cursor with block-max metadata
///
/// Cursors only move forward. `doc()` is [`TERMINATED`](crate::TERMINATED)
/// once exhausted.
pub trait PostingSource {
    /// Current doc id, or TERMINATED
    fn doc(&self) -> DocId;

    /// Weight of the current posting (undefined once exhausted, returns 0)
    fn weight(&self) -> Weight;

    /// Advance to the next posting
    fn advance(&mut self) -> DocId;

    /// Advance to the first posting with doc >= target
    fn seek(&mut self, target: DocId) -> DocId;

    /// Number of postings in the list
    fn cost(&self) -> u32;

    /// Largest weight in the whole list
    fn max_weight(&self) -> Weight;

    fn num_blocks(&self) -> usize;

    /// Bounds of block `block_idx`
    fn block_bounds(&self, block_idx: usize) -> Option<BlockBounds>;

    /// Block holding the current posting (num_blocks() once exhausted)
    fn block_index(&self) -> usize;

    /// First block at or after `from` whose last doc >= target
    fn find_block(&self, target: DocId, from: usize) -> Option<usize>;

    /// Jump to the first posting of `block_idx` (exhausts past the end)
    fn skip_to_block(&mut self, block_idx: usize) -> DocId;
}

/// Term -> posting source lookup over an immutable index
pub trait PostingReader {
    type Source<'a>: PostingSource
    where
        Self: 'a;

    /// Postings for a dimension token, None when no document has it
    fn postings(&self, token: &str) -> Option<Self::Source<'_>>;

    /// Quantization the postings were encoded with
    fn quantization(&self) -> &QuantizationConfig;

    fn num_docs(&self) -> u32;
}

/// Longest varint for a `u32` (doc id delta or weight)
pub const MAX_VINT_BYTES: usize = 5;

/// Append `value` as a little-endian base-128 varint
#[inline]
pub fn write_vint<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    let mut rest = value;
    while rest >= 0x80 {
        writer.write_u8((rest as u8 & 0x7F) | 0x80)?;
        rest >>= 7;
    }
    writer.write_u8(rest as u8)
}

/// Read a varint written by [`write_vint`]
///
/// Fails with `InvalidData` when the encoding runs past
/// [`MAX_VINT_BYTES`] or does not fit a `u32`.
#[inline]
pub fn read_vint<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut value = 0u64;
    for i in 0..MAX_VINT_BYTES {
        let byte = reader.read_u8()?;
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return u32::try_from(value)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "varint exceeds u32"));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint longer than 5 bytes",
    ))
}
