//! Block-Max WAND top-k execution over disjunctive dimension scorers

use log::{debug, trace};

use super::{ImpactScorer, ScoreCollector, ScoredDoc};
use crate::{DocId, Score, TERMINATED};

/// Sum of per-document contributions in scorer order
///
/// Both the pruned and the exhaustive path add contributions in ascending
/// scorer index starting from 0.0, so equal inputs give bit-identical scores.
#[inline]
fn sum_in_scorer_order<S: ImpactScorer>(scorers: &[S], group: &[usize]) -> Score {
    let mut score = 0.0f32;
    for &i in group {
        score += scorers[i].score();
    }
    score
}

/// Widen a sum of `n` non-negative f32 bounds to cover rounding
///
/// A document score adds up to `n` contributions in a different order than
/// the bound; each order may round differently by at most `n` ulps.
#[inline]
fn score_sum_upper_bound(sum: Score, n: usize) -> Score {
    sum + sum.abs() * (2 * n) as f32 * f32::EPSILON
}

/// Block-Max WAND executor for top-k retrieval
///
/// - WAND pivot selection from global max scores
/// - Block-max check over the pivot window before decoding postings
/// - `heap_factor < 1.0` prunes more aggressively (approximate search)
///
/// With `heap_factor == 1.0` the result equals [`exhaustive_top_k`].
pub struct BlockMaxExecutor<S: ImpactScorer> {
    scorers: Vec<S>,
    collector: ScoreCollector,
    heap_factor: f32,
}

impl<S: ImpactScorer> BlockMaxExecutor<S> {
    /// Exact search (heap_factor = 1.0)
    pub fn new(scorers: Vec<S>, k: usize) -> Self {
        Self::with_heap_factor(scorers, k, 1.0)
    }

    /// A block/document is skipped if `max_possible * heap_factor <= threshold`
    pub fn with_heap_factor(scorers: Vec<S>, k: usize, heap_factor: f32) -> Self {
        let total_upper: f32 = scorers.iter().map(|s| s.max_score()).sum();
        let total_cost: u64 = scorers.iter().map(|s| s.cost() as u64).sum();

        debug!(
            "Creating BlockMaxExecutor: num_scorers={}, k={}, postings={}, total_upper={:.4}, heap_factor={:.2}",
            scorers.len(),
            k,
            total_cost,
            total_upper,
            heap_factor
        );

        Self {
            scorers,
            collector: ScoreCollector::new(k),
            heap_factor: if heap_factor.is_nan() {
                1.0
            } else {
                heap_factor.clamp(f32::MIN_POSITIVE, 1.0)
            },
        }
    }

    /// Collector threshold raised by 1/heap_factor (positive thresholds only)
    #[inline]
    fn threshold(&self) -> Score {
        let threshold = self.collector.threshold();
        if threshold > 0.0 && threshold.is_finite() {
            threshold / self.heap_factor
        } else {
            threshold
        }
    }

    #[inline]
    fn doc(&self, idx: usize) -> DocId {
        self.scorers[idx].doc()
    }

    fn sort_by_doc(&self, order: &mut [usize]) {
        let scorers = &self.scorers;
        order.sort_by_key(|&i| (scorers[i].doc(), i));
    }

    /// Execute and return the top-k hits (score descending, doc ascending)
    ///
    /// Loop:
    /// 1. keep scorers ordered by current doc
    /// 2. pivot = first position where cumulative max scores beat the threshold
    /// 3. with a full heap, bound the window `[pivot, up_to]` with block maxima
    ///    and skip it whole when it cannot beat the threshold
    /// 4. if the first scorer sits on the pivot, score it; else seek to the pivot
    pub fn execute(mut self) -> Vec<ScoredDoc> {
        let num_scorers = self.scorers.len();
        if num_scorers == 0 || self.collector.k() == 0 {
            debug!("BlockMaxExecutor: nothing to do, returning empty results");
            return Vec::new();
        }

        let mut docs_scored = 0u64;
        let mut docs_rejected = 0u64;
        let mut windows_skipped = 0u64;

        let mut order: Vec<usize> = (0..num_scorers).collect();
        self.sort_by_doc(&mut order);

        loop {
            // Exhausted scorers sort last
            let active = order.partition_point(|&i| self.doc(i) != TERMINATED);
            if active == 0 {
                break;
            }

            let threshold = self.threshold();
            let full = self.collector.is_full();

            if full {
                let total_upper: f32 = order[..active]
                    .iter()
                    .map(|&i| self.scorers[i].max_score())
                    .sum();
                if score_sum_upper_bound(total_upper, active) <= threshold {
                    debug!(
                        "Early termination: upper_bound={:.4} <= threshold={:.4}",
                        total_upper, threshold
                    );
                    break;
                }
            }

            // Pivot: until the heap is full every document is a candidate
            let pivot_pos = if full {
                let mut cumsum = 0.0f32;
                let mut found = None;
                for (pos, &idx) in order[..active].iter().enumerate() {
                    cumsum += self.scorers[idx].max_score();
                    if score_sum_upper_bound(cumsum, pos + 1) > threshold {
                        found = Some(pos);
                        break;
                    }
                }
                match found {
                    Some(pos) => pos,
                    None => break,
                }
            } else {
                0
            };
            let pivot_doc = self.doc(order[pivot_pos]);

            // Every scorer positioned on the pivot doc joins the window
            let mut group_end = pivot_pos + 1;
            while group_end < active && self.doc(order[group_end]) == pivot_doc {
                group_end += 1;
            }

            if full {
                let next_doc = order
                    .get(group_end)
                    .map(|&i| self.doc(i))
                    .unwrap_or(TERMINATED);
                let mut up_to = next_doc.saturating_sub(1);
                for &idx in &order[..group_end] {
                    self.scorers[idx].advance_shallow(pivot_doc);
                    up_to = up_to.min(self.scorers[idx].block_end());
                }

                let mut window: Vec<usize> = order[..group_end].to_vec();
                window.sort_unstable();
                let mut block_upper = 0.0f32;
                for &idx in &window {
                    block_upper += self.scorers[idx].get_max_score(up_to);
                }

                if score_sum_upper_bound(block_upper, window.len()) <= threshold {
                    trace!(
                        "Skipping window [{}, {}]: block_upper={:.4} <= threshold={:.4}",
                        pivot_doc, up_to, block_upper, threshold
                    );
                    let target = up_to.saturating_add(1);
                    for &idx in &window {
                        self.scorers[idx].seek(target);
                    }
                    windows_skipped += 1;
                    self.sort_by_doc(&mut order);
                    continue;
                }
            }

            if self.doc(order[0]) == pivot_doc {
                // order[..group_end] all sit on the pivot doc
                let mut group: Vec<usize> = order[..group_end].to_vec();
                group.sort_unstable();
                let score = sum_in_scorer_order(&self.scorers, &group);

                trace!(
                    "Doc {}: score={:.4}, matching={}/{}, threshold={:.4}",
                    pivot_doc,
                    score,
                    group.len(),
                    num_scorers,
                    threshold
                );

                if self.collector.insert(pivot_doc, score) {
                    docs_scored += 1;
                    if num_scorers == 1 && self.collector.is_full() {
                        let min_competitive = self.threshold();
                        self.scorers[0].set_min_competitive_score(min_competitive);
                    }
                } else {
                    docs_rejected += 1;
                }

                for &idx in &group {
                    self.scorers[idx].advance();
                }
            } else {
                // Nothing before the pivot can reach the threshold alone
                for &idx in &order[..pivot_pos] {
                    self.scorers[idx].seek(pivot_doc);
                }
            }

            self.sort_by_doc(&mut order);
        }

        let results = self.collector.into_sorted_results();

        debug!(
            "BlockMaxExecutor completed: inserted={}, rejected={}, windows_skipped={}, returned={}, top_score={:.4}",
            docs_scored,
            docs_rejected,
            windows_skipped,
            results.len(),
            results.first().map(|r| r.score).unwrap_or(0.0)
        );

        results
    }
}

/// Unpruned reference scan with the same collector and summation order
pub fn exhaustive_top_k<S: ImpactScorer>(mut scorers: Vec<S>, k: usize) -> Vec<ScoredDoc> {
    let mut collector = ScoreCollector::new(k);
    if k == 0 {
        return Vec::new();
    }

    loop {
        let doc = scorers
            .iter()
            .map(|s| s.doc())
            .min()
            .unwrap_or(TERMINATED);
        if doc == TERMINATED {
            break;
        }

        let group: Vec<usize> = (0..scorers.len())
            .filter(|&i| scorers[i].doc() == doc)
            .collect();
        let score = sum_in_scorer_order(&scorers, &group);
        collector.insert(doc, score);
        for &i in &group {
            scorers[i].advance();
        }
    }

    collector.into_sorted_results()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::BlockPostingList;
    use crate::query::DimensionScorer;

    const MULTIPLIER: u32 = 1000;

    fn lists() -> Vec<BlockPostingList> {
        vec![
            BlockPostingList::from_postings_with_block_size(
                &[(0, 100), (2, 900), (5, 300), (8, 50), (9, 700)],
                2,
            )
            .unwrap(),
            BlockPostingList::from_postings_with_block_size(
                &[(1, 400), (2, 200), (6, 800), (9, 100)],
                2,
            )
            .unwrap(),
            BlockPostingList::from_postings_with_block_size(&[(3, 999), (7, 10)], 2).unwrap(),
        ]
    }

    fn scorers(lists: &[BlockPostingList]) -> Vec<DimensionScorer<crate::postings::BlockPostingIterator<'_>>> {
        lists
            .iter()
            .map(|l| DimensionScorer::new(l.iterator(), 1.0, MULTIPLIER))
            .collect()
    }

    #[test]
    fn test_executor_matches_exhaustive() {
        let lists = lists();
        for k in 0..=12 {
            let pruned = BlockMaxExecutor::new(scorers(&lists), k).execute();
            let exact = exhaustive_top_k(scorers(&lists), k);
            assert_eq!(pruned, exact, "k={}", k);
        }
    }

    #[test]
    fn test_executor_top_hits() {
        let lists = lists();
        let results = BlockMaxExecutor::new(scorers(&lists), 3).execute();
        let docs: Vec<DocId> = results.iter().map(|r| r.doc_id).collect();
        // doc 2: 0.9 + 0.2, doc 3: 0.999, doc 6: 0.8, doc 9: 0.7 + 0.1
        assert_eq!(docs, vec![2, 3, 6]);
        assert!((results[0].score - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_single_scorer() {
        let lists = lists();
        let single = vec![DimensionScorer::new(lists[0].iterator(), 1.0, MULTIPLIER)];
        let results = BlockMaxExecutor::new(single, 2).execute();
        let docs: Vec<DocId> = results.iter().map(|r| r.doc_id).collect();
        assert_eq!(docs, vec![2, 9]);
    }

    #[test]
    fn test_empty_scorers() {
        let results =
            BlockMaxExecutor::<DimensionScorer<crate::postings::BlockPostingIterator<'_>>>::new(
                Vec::new(),
                10,
            )
            .execute();
        assert!(results.is_empty());
    }

    #[test]
    fn test_score_sum_upper_bound() {
        assert_eq!(score_sum_upper_bound(0.0, 4), 0.0);
        assert!(score_sum_upper_bound(1.0, 3) > 1.0);
        assert!(score_sum_upper_bound(1.0, 3) < 1.0 + 1e-5);
    }
}
