//! Block posting list with per-block max weights
//!
//! Postings are split into fixed-size blocks. Each block keeps a small header
//! (first doc, last doc, max weight, count) next to its compressed payload:
//! delta-encoded doc ids followed by weights, both as varints. Iterators
//! decode one block at a time; the headers alone drive block-max pruning.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::{BLOCK_SIZE, BlockBounds, MAX_VINT_BYTES, PostingSource, read_vint, write_vint};
use crate::error::{Error, Result};
use crate::{DocId, TERMINATED, Weight};

/// One block of postings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingBlock {
    bounds: BlockBounds,
    count: u32,
    data: Vec<u8>,
}

impl PostingBlock {
    fn from_postings(postings: &[(DocId, Weight)]) -> io::Result<Self> {
        let mut data = Vec::with_capacity(postings.len() * 3);
        let mut prev = postings[0].0;
        for &(doc_id, _) in postings {
            write_vint(&mut data, doc_id - prev)?;
            prev = doc_id;
        }
        for &(_, weight) in postings {
            write_vint(&mut data, weight)?;
        }

        Ok(Self {
            bounds: BlockBounds {
                first_doc: postings[0].0,
                last_doc: postings[postings.len() - 1].0,
                max_weight: postings.iter().map(|&(_, w)| w).max().unwrap_or(0),
            },
            count: postings.len() as u32,
            data,
        })
    }

    pub fn bounds(&self) -> BlockBounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decode doc ids and weights into the given buffers (cleared first)
    fn decode_into(&self, doc_ids: &mut Vec<DocId>, weights: &mut Vec<Weight>) -> io::Result<()> {
        doc_ids.clear();
        weights.clear();
        let mut reader = io::Cursor::new(&self.data);
        let mut doc = self.bounds.first_doc;
        for _ in 0..self.count {
            doc = doc
                .checked_add(read_vint(&mut reader)?)
                .ok_or_else(|| invalid_data("doc id delta overflows"))?;
            doc_ids.push(doc);
        }
        for _ in 0..self.count {
            weights.push(read_vint(&mut reader)?);
        }
        if reader.position() != self.data.len() as u64 {
            return Err(invalid_data("trailing bytes after block payload"));
        }
        Ok(())
    }

    /// Decode once and check the payload against the header
    ///
    /// Doc ids start at `first_doc`, strictly increase and end at `last_doc`;
    /// weights are non-zero and never above `max_weight`.
    fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Error::Corruption(format!("posting block: {}", msg));
        if self.count == 0 {
            return Err(corrupt("empty block".into()));
        }
        let (mut doc_ids, mut weights) = (Vec::new(), Vec::new());
        self.decode_into(&mut doc_ids, &mut weights)
            .map_err(|e| corrupt(e.to_string()))?;

        let bounds = self.bounds;
        if doc_ids.first() != Some(&bounds.first_doc) || doc_ids.last() != Some(&bounds.last_doc)
        {
            return Err(corrupt(format!(
                "doc ids do not span {}..={}",
                bounds.first_doc, bounds.last_doc
            )));
        }
        if bounds.last_doc == TERMINATED || doc_ids.windows(2).any(|d| d[0] >= d[1]) {
            return Err(corrupt("doc ids not strictly increasing".into()));
        }
        if let Some(&w) = weights.iter().find(|&&w| w == 0 || w > bounds.max_weight) {
            return Err(corrupt(format!(
                "weight {} outside 1..={}",
                w, bounds.max_weight
            )));
        }
        Ok(())
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.bounds.first_doc)?;
        w.write_u32::<LittleEndian>(self.bounds.last_doc)?;
        w.write_u32::<LittleEndian>(self.bounds.max_weight)?;
        w.write_u32::<LittleEndian>(self.count)?;
        w.write_u32::<LittleEndian>(self.data.len() as u32)?;
        w.write_all(&self.data)
    }

    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let first_doc = r.read_u32::<LittleEndian>()?;
        let last_doc = r.read_u32::<LittleEndian>()?;
        let max_weight = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()?;
        let data_len = r.read_u32::<LittleEndian>()? as u64;
        // Two varints per posting
        if data_len > count as u64 * 2 * MAX_VINT_BYTES as u64 {
            return Err(invalid_data("block payload longer than its postings allow"));
        }
        // Grows with the bytes actually present instead of trusting the header
        let mut data = Vec::new();
        r.by_ref().take(data_len).read_to_end(&mut data)?;
        if data.len() as u64 != data_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated block payload",
            ));
        }
        Ok(Self {
            bounds: BlockBounds {
                first_doc,
                last_doc,
                max_weight,
            },
            count,
            data,
        })
    }
}

/// Posting list for one dimension token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPostingList {
    doc_count: u32,
    max_weight: Weight,
    blocks: Vec<PostingBlock>,
}

impl BlockPostingList {
    /// Create from postings with the default block size (128)
    pub fn from_postings(postings: &[(DocId, Weight)]) -> Result<Self> {
        Self::from_postings_with_block_size(postings, BLOCK_SIZE)
    }

    /// Create from postings sorted by strictly increasing doc id
    ///
    /// Weights must be non-zero: a zero weight cannot be told apart from an
    /// absent posting.
    pub fn from_postings_with_block_size(
        postings: &[(DocId, Weight)],
        block_size: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::Config("block size must be at least 1".into()));
        }
        if let Some(pair) = postings.windows(2).find(|p| p[0].0 >= p[1].0) {
            return Err(Error::Corruption(format!(
                "postings out of order: doc {} followed by {}",
                pair[0].0, pair[1].0
            )));
        }
        if let Some(&(doc_id, _)) = postings.iter().find(|&&(d, w)| w == 0 || d == TERMINATED) {
            return Err(Error::Corruption(format!(
                "invalid posting for doc {}: zero weight or reserved doc id",
                doc_id
            )));
        }

        let blocks = postings
            .chunks(block_size)
            .map(PostingBlock::from_postings)
            .collect::<io::Result<Vec<_>>>()?;
        let max_weight = blocks
            .iter()
            .map(|b| b.bounds.max_weight)
            .max()
            .unwrap_or(0);

        Ok(Self {
            doc_count: postings.len() as u32,
            max_weight,
            blocks,
        })
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn max_weight(&self) -> Weight {
        self.max_weight
    }

    pub fn block_bounds(&self, block_idx: usize) -> Option<BlockBounds> {
        self.blocks.get(block_idx).map(|b| b.bounds)
    }

    pub fn iterator(&self) -> BlockPostingIterator<'_> {
        BlockPostingIterator::new(self)
    }

    /// Decode every posting (for inspection and tests)
    pub fn decode_all(&self) -> Result<Vec<(DocId, Weight)>> {
        let mut result = Vec::with_capacity(self.doc_count as usize);
        let (mut doc_ids, mut weights) = (Vec::new(), Vec::new());
        for block in &self.blocks {
            block.decode_into(&mut doc_ids, &mut weights)?;
            result.extend(doc_ids.iter().copied().zip(weights.iter().copied()));
        }
        Ok(result)
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.doc_count)?;
        w.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            block.write(w)?;
        }
        Ok(())
    }

    /// Read a list written by [`serialize`](Self::serialize)
    ///
    /// Every block payload is decoded once and checked against its header, so
    /// iterators never meet a corrupt block later.
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let doc_count = r.read_u32::<LittleEndian>()?;
        let num_blocks = r.read_u32::<LittleEndian>()? as usize;
        let mut blocks: Vec<PostingBlock> = Vec::with_capacity(num_blocks.min(1 << 16));
        for _ in 0..num_blocks {
            let block = PostingBlock::read(r)?;
            block.validate()?;
            if let Some(prev) = blocks.last()
                && prev.bounds.last_doc >= block.bounds.first_doc
            {
                return Err(Error::Corruption(format!(
                    "posting blocks overlap: {} then {}",
                    prev.bounds.last_doc, block.bounds.first_doc
                )));
            }
            blocks.push(block);
        }

        let total: u64 = blocks.iter().map(|b| b.count as u64).sum();
        if total != doc_count as u64 {
            return Err(Error::Corruption(format!(
                "posting list header says {} docs, blocks hold {}",
                doc_count, total
            )));
        }
        let max_weight = blocks
            .iter()
            .map(|b| b.bounds.max_weight)
            .max()
            .unwrap_or(0);
        Ok(Self {
            doc_count,
            max_weight,
            blocks,
        })
    }

    /// Last doc id in the list
    pub fn last_doc(&self) -> Option<DocId> {
        self.blocks.last().map(|b| b.bounds.last_doc)
    }

    /// First block at or after `from` whose last doc >= target
    fn find_block(&self, target: DocId, from: usize) -> Option<usize> {
        let tail = self.blocks.get(from..)?;
        let offset = tail.partition_point(|b| b.bounds.last_doc < target);
        let idx = from + offset;
        (idx < self.blocks.len()).then_some(idx)
    }
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

// ============================================================================
// Iterator
// ============================================================================

pub struct BlockPostingIterator<'a> {
    posting_list: &'a BlockPostingList,
    block_idx: usize,
    in_block_idx: usize,
    current_doc_ids: Vec<DocId>,
    current_weights: Vec<Weight>,
    exhausted: bool,
}

impl<'a> BlockPostingIterator<'a> {
    fn new(posting_list: &'a BlockPostingList) -> Self {
        let mut iter = Self {
            posting_list,
            block_idx: 0,
            in_block_idx: 0,
            current_doc_ids: Vec::with_capacity(BLOCK_SIZE),
            current_weights: Vec::with_capacity(BLOCK_SIZE),
            exhausted: posting_list.blocks.is_empty(),
        };
        if !iter.exhausted {
            iter.load_block(0);
        }
        iter
    }

    fn load_block(&mut self, block_idx: usize) {
        match self.posting_list.blocks.get(block_idx) {
            Some(block) => {
                self.block_idx = block_idx;
                self.in_block_idx = 0;
                // Lists are built from checked postings or validated on load
                if let Err(e) = block.decode_into(&mut self.current_doc_ids, &mut self.current_weights)
                {
                    log::error!("corrupt posting block {}: {}", block_idx, e);
                    self.exhausted = true;
                }
            }
            None => {
                self.block_idx = self.posting_list.blocks.len();
                self.exhausted = true;
            }
        }
    }

    fn next_block(&mut self) {
        self.load_block(self.block_idx + 1);
    }
}

impl PostingSource for BlockPostingIterator<'_> {
    fn doc(&self) -> DocId {
        if self.exhausted {
            TERMINATED
        } else {
            self.current_doc_ids
                .get(self.in_block_idx)
                .copied()
                .unwrap_or(TERMINATED)
        }
    }

    fn weight(&self) -> Weight {
        if self.exhausted {
            return 0;
        }
        self.current_weights
            .get(self.in_block_idx)
            .copied()
            .unwrap_or(0)
    }

    fn advance(&mut self) -> DocId {
        if self.exhausted {
            return TERMINATED;
        }
        self.in_block_idx += 1;
        if self.in_block_idx >= self.current_doc_ids.len() {
            self.next_block();
        }
        self.doc()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.exhausted {
            return TERMINATED;
        }
        if self.doc() >= target {
            return self.doc();
        }

        // Target outside the current block: jump via block headers
        if self.posting_list.blocks[self.block_idx].bounds.last_doc < target {
            match self.posting_list.find_block(target, self.block_idx + 1) {
                Some(block_idx) => self.load_block(block_idx),
                None => {
                    self.load_block(self.posting_list.blocks.len());
                    return TERMINATED;
                }
            }
        }

        // The loaded block holds a doc >= target
        let remaining = &self.current_doc_ids[self.in_block_idx..];
        self.in_block_idx += remaining.partition_point(|&d| d < target);
        self.doc()
    }

    fn cost(&self) -> u32 {
        self.posting_list.doc_count
    }

    fn max_weight(&self) -> Weight {
        self.posting_list.max_weight
    }

    fn num_blocks(&self) -> usize {
        self.posting_list.blocks.len()
    }

    fn block_bounds(&self, block_idx: usize) -> Option<BlockBounds> {
        self.posting_list.block_bounds(block_idx)
    }

    fn block_index(&self) -> usize {
        if self.exhausted {
            self.posting_list.blocks.len()
        } else {
            self.block_idx
        }
    }

    fn find_block(&self, target: DocId, from: usize) -> Option<usize> {
        self.posting_list.find_block(target, from)
    }

    fn skip_to_block(&mut self, block_idx: usize) -> DocId {
        if self.exhausted {
            return TERMINATED;
        }
        if block_idx > self.block_idx {
            self.load_block(block_idx);
        }
        self.doc()
    }
}
