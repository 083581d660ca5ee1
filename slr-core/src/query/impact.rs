//! Impact-bounded scoring interface

use crate::{DocId, Score, TERMINATED};

/// A per-dimension scorer that exposes score upper bounds for dynamic pruning
///
/// Two cursors are involved: the posting cursor (`doc`, `advance`, `seek`)
/// and a shallow block cursor (`advance_shallow`) that only moves over block
/// headers, so bounds for a doc range can be read without decoding postings.
pub trait ImpactScorer {
    /// Current document ID (TERMINATED if exhausted)
    fn doc(&self) -> DocId;

    /// Advance to next document, returns new doc ID
    fn advance(&mut self) -> DocId;

    /// Seek to first document >= target, returns new doc ID
    fn seek(&mut self, target: DocId) -> DocId;

    fn is_exhausted(&self) -> bool {
        self.doc() == TERMINATED
    }

    /// Contribution of the current document
    fn score(&self) -> Score;

    /// Upper bound of the contribution over the whole posting list
    fn max_score(&self) -> Score;

    /// Move the shallow cursor to the block that may contain `target`
    ///
    /// Returns the first doc of that block, TERMINATED past the last block.
    fn advance_shallow(&mut self, target: DocId) -> DocId;

    /// Last doc of the block under the shallow cursor (TERMINATED past the end)
    fn block_end(&self) -> DocId;

    /// Upper bound of the contribution for any unvisited doc <= `up_to`
    ///
    /// Covers blocks from the shallow cursor up to the last block starting at
    /// or before `up_to`. Never under-estimates.
    fn get_max_score(&self, up_to: DocId) -> Score;

    /// Lowest score a document needs to be worth returning
    fn set_min_competitive_score(&mut self, score: Score);

    /// Number of postings, used for ordering and stats
    fn cost(&self) -> u32;
}
