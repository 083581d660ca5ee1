//! Top-k collection

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::{DocId, Score};

/// A scored hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: Score,
}

/// Entry for top-k min-heap
#[derive(Clone, Copy)]
struct HeapEntry {
    doc_id: DocId,
    score: Score,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: lower scores come first (to be evicted); among equal
        // scores the higher doc id is evicted first
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Top-k collector using a min-heap
///
/// A document enters a full collector only with a score strictly greater than
/// the current threshold, so on equal scores the earlier (lower) doc id wins
/// when documents arrive in doc order. No deduplication: each doc id must be
/// inserted at most once.
pub struct ScoreCollector {
    heap: BinaryHeap<HeapEntry>,
    k: usize,
}

impl ScoreCollector {
    pub fn new(k: usize) -> Self {
        // Cap capacity to avoid allocation overflow for very large k
        let capacity = k.saturating_add(1).min(1_000_000);
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            k,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Score a document must exceed to enter the top-k
    ///
    /// NEG_INFINITY while the collector is not full.
    #[inline]
    pub fn threshold(&self) -> Score {
        if self.is_full() {
            self.heap.peek().map(|e| e.score).unwrap_or(f32::INFINITY)
        } else {
            f32::NEG_INFINITY
        }
    }

    /// Insert a document score. Returns true if it entered the top-k.
    #[inline]
    pub fn insert(&mut self, doc_id: DocId, score: Score) -> bool {
        if !self.is_full() {
            self.heap.push(HeapEntry { doc_id, score });
            true
        } else if score > self.threshold() {
            self.heap.push(HeapEntry { doc_id, score });
            self.heap.pop();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Hits sorted by score descending, then doc id ascending
    pub fn into_sorted_results(self) -> Vec<ScoredDoc> {
        let mut results: Vec<ScoredDoc> = self
            .heap
            .into_vec()
            .into_iter()
            .map(|e| ScoredDoc {
                doc_id: e.doc_id,
                score: e.score,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        results
    }
}
