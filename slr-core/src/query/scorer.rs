//! Dot-product scorer for one query dimension

use log::debug;

use super::ImpactScorer;
use crate::postings::PostingSource;
use crate::{DocId, Score, TERMINATED, Weight};

/// Contribution of one matched posting: `query_weight * weight / multiplier`
///
/// The stored value is reconstructed in f64 and narrowed once, so the result
/// is monotone in `weight` for a non-negative query weight.
#[inline]
pub fn contribution(query_weight: f32, weight: Weight, multiplier: u32) -> Score {
    query_weight * (weight as f64 / multiplier as f64) as f32
}

/// Scorer for one sparse dimension
///
/// Wraps a posting source with the query weight of its dimension. When used
/// on its own, a min competitive score lets `advance`/`seek` jump over blocks
/// whose best contribution cannot reach it.
pub struct DimensionScorer<P: PostingSource> {
    postings: P,
    query_weight: f32,
    multiplier: u32,
    /// Global max contribution
    max_score: Score,
    /// Block under the shallow cursor
    shallow_block: usize,
    min_competitive_score: Score,
}

impl<P: PostingSource> DimensionScorer<P> {
    pub fn new(postings: P, query_weight: f32, multiplier: u32) -> Self {
        let mut scorer = Self {
            shallow_block: postings.block_index(),
            postings,
            query_weight,
            multiplier,
            max_score: 0.0,
            min_competitive_score: f32::NEG_INFINITY,
        };
        scorer.max_score = scorer.bound(scorer.postings.max_weight());

        debug!(
            "DimensionScorer: postings={}, blocks={}, query_weight={:.4}, max_score={:.4}",
            scorer.postings.cost(),
            scorer.postings.num_blocks(),
            query_weight,
            scorer.max_score
        );
        scorer
    }

    pub fn query_weight(&self) -> f32 {
        self.query_weight
    }

    /// Weight of the posting under the cursor
    pub fn weight(&self) -> Weight {
        self.postings.weight()
    }

    /// Bound for a posting weight; a negative query weight never adds score
    #[inline]
    fn bound(&self, weight: Weight) -> Score {
        if self.query_weight <= 0.0 {
            0.0
        } else {
            contribution(self.query_weight, weight, self.multiplier)
        }
    }

    #[inline]
    fn block_max_score(&self, block_idx: usize) -> Score {
        self.postings
            .block_bounds(block_idx)
            .map(|b| self.bound(b.max_weight))
            .unwrap_or(0.0)
    }

    /// Jump over blocks that cannot beat the min competitive score
    fn skip_non_competitive(&mut self) -> DocId {
        loop {
            let doc = self.postings.doc();
            if doc == TERMINATED {
                return doc;
            }
            let block_idx = self.postings.block_index();
            if self.block_max_score(block_idx) > self.min_competitive_score {
                return doc;
            }
            self.postings.skip_to_block(block_idx + 1);
        }
    }
}

impl<P: PostingSource> ImpactScorer for DimensionScorer<P> {
    #[inline]
    fn doc(&self) -> DocId {
        self.postings.doc()
    }

    #[inline]
    fn advance(&mut self) -> DocId {
        self.postings.advance();
        self.skip_non_competitive()
    }

    #[inline]
    fn seek(&mut self, target: DocId) -> DocId {
        self.postings.seek(target);
        self.skip_non_competitive()
    }

    #[inline]
    fn score(&self) -> Score {
        contribution(self.query_weight, self.postings.weight(), self.multiplier)
    }

    #[inline]
    fn max_score(&self) -> Score {
        self.max_score
    }

    fn advance_shallow(&mut self, target: DocId) -> DocId {
        let from = self.postings.block_index();
        match self.postings.find_block(target, from) {
            Some(block_idx) => {
                self.shallow_block = block_idx;
                self.postings
                    .block_bounds(block_idx)
                    .map(|b| b.first_doc)
                    .unwrap_or(TERMINATED)
            }
            None => {
                self.shallow_block = self.postings.num_blocks();
                TERMINATED
            }
        }
    }

    fn block_end(&self) -> DocId {
        self.postings
            .block_bounds(self.shallow_block)
            .map(|b| b.last_doc)
            .unwrap_or(TERMINATED)
    }

    fn get_max_score(&self, up_to: DocId) -> Score {
        if self.query_weight <= 0.0 {
            return 0.0;
        }
        let mut max_weight = None;
        let mut block_idx = self.shallow_block;
        while let Some(bounds) = self.postings.block_bounds(block_idx)
            && bounds.first_doc <= up_to
        {
            max_weight = max_weight.max(Some(bounds.max_weight));
            block_idx += 1;
        }
        max_weight.map(|w| self.bound(w)).unwrap_or(0.0)
    }

    fn set_min_competitive_score(&mut self, score: Score) {
        if score > self.min_competitive_score {
            self.min_competitive_score = score;
        }
    }

    #[inline]
    fn cost(&self) -> u32 {
        self.postings.cost()
    }
}
